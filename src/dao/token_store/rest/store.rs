use std::{collections::HashSet, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{
    Client, Method,
    header::{HeaderName, HeaderValue},
};

const PREFER: HeaderName = HeaderName::from_static("prefer");

use crate::dao::{
    storage::StorageResult,
    token_store::{TokenRecord, TokenStore},
};

use super::{
    config::RestConfig,
    error::{RestDaoError, RestResult},
    models::{RestTokenRow, TOKENS_TABLE, TokenPatch},
};

/// [`TokenStore`] backed by a PostgREST-compatible `tokens` table API.
#[derive(Clone)]
pub struct RestTokenStore {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
}

impl RestTokenStore {
    /// Establish a connection to the REST API and probe the tokens table.
    pub async fn connect(config: RestConfig) -> RestResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| RestDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let api_key = config.api_key.map(Arc::<str>::from);

        let store = Self {
            client,
            base_url,
            api_key,
        };

        store.probe_table().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path_and_query: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path_and_query);
        let mut builder = self.client.request(method, url);
        if let Some(ref key) = self.api_key {
            builder = builder
                .header("apikey", key.as_ref())
                .bearer_auth(key.as_ref());
        }
        builder
    }

    /// Cheap existence check used at connect time and by health polling.
    async fn probe_table(&self) -> RestResult<()> {
        let path = format!("{TOKENS_TABLE}?select=department&limit=1");
        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RestDaoError::RequestStatus {
                path,
                status: response.status(),
            })
        }
    }

    async fn fetch_rows(&self) -> RestResult<Vec<RestTokenRow>> {
        let path = format!("{TOKENS_TABLE}?select=department,current_token");
        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(RestDaoError::RequestStatus {
                path,
                status: response.status(),
            });
        }

        response
            .json::<Vec<RestTokenRow>>()
            .await
            .map_err(|source| RestDaoError::DecodeResponse { path, source })
    }

    async fn patch_row(&self, department: &str, value: u32) -> RestResult<()> {
        let path = format!("{TOKENS_TABLE}?department=eq.{department}");
        let response = self
            .request(Method::PATCH, &path)
            .header(PREFER, HeaderValue::from_static("return=minimal"))
            .json(&TokenPatch {
                current_token: value,
            })
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RestDaoError::RequestStatus {
                path,
                status: response.status(),
            })
        }
    }

    async fn insert_rows(&self, rows: &[RestTokenRow]) -> RestResult<()> {
        // on_conflict + ignore-duplicates keeps concurrent provisioning harmless.
        let path = format!("{TOKENS_TABLE}?on_conflict=department");
        let response = self
            .request(Method::POST, &path)
            .header(
                PREFER,
                HeaderValue::from_static("resolution=ignore-duplicates,return=minimal"),
            )
            .json(rows)
            .send()
            .await
            .map_err(|source| RestDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RestDaoError::RequestStatus {
                path,
                status: response.status(),
            })
        }
    }

    async fn provision_missing(&self, departments: Vec<String>) -> RestResult<()> {
        let existing: HashSet<String> = self
            .fetch_rows()
            .await?
            .into_iter()
            .map(|row| row.department)
            .collect();

        let missing: Vec<RestTokenRow> = departments
            .into_iter()
            .filter(|department| !existing.contains(department))
            .map(RestTokenRow::provisioned)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        self.insert_rows(&missing).await
    }
}

impl TokenStore for RestTokenStore {
    fn list_tokens(&self) -> BoxFuture<'static, StorageResult<Vec<TokenRecord>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store.fetch_rows().await?;
            Ok(rows.into_iter().map(RestTokenRow::into_record).collect())
        })
    }

    fn put_token(&self, department: String, value: u32) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .patch_row(&department, value)
                .await
                .map_err(Into::into)
        })
    }

    fn provision(&self, departments: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .provision_missing(departments)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe_table().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.probe_table().await.map_err(Into::into) })
    }
}
