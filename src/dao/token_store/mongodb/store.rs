use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc};
use tokio::sync::RwLock;

use crate::dao::{
    storage::StorageResult,
    token_store::{TokenRecord, TokenStore},
};

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::MongoTokenDocument,
};

const TOKEN_COLLECTION_NAME: &str = "tokens";

/// MongoDB-backed [`TokenStore`] implementation.
#[derive(Clone)]
pub struct MongoTokenStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoTokenStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn collection(&self) -> Collection<MongoTokenDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoTokenDocument>(TOKEN_COLLECTION_NAME)
    }

    async fn list(&self) -> MongoResult<Vec<TokenRecord>> {
        let collection = self.collection().await;

        let documents: Vec<MongoTokenDocument> = collection
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListTokens { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListTokens { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn put(&self, department: String, value: u32) -> MongoResult<()> {
        let collection = self.collection().await;
        collection
            .update_one(
                doc! { "_id": &department },
                doc! { "$set": { "current_token": value } },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveToken { department, source })?;
        Ok(())
    }

    async fn provision(&self, departments: Vec<String>) -> MongoResult<()> {
        let collection = self.collection().await;
        for department in departments {
            // $setOnInsert leaves already-provisioned counters alone.
            collection
                .update_one(
                    doc! { "_id": &department },
                    doc! { "$setOnInsert": { "current_token": 0 } },
                )
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Provision { department, source })?;
        }
        Ok(())
    }
}

impl TokenStore for MongoTokenStore {
    fn list_tokens(&self) -> BoxFuture<'static, StorageResult<Vec<TokenRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.list().await.map_err(Into::into) })
    }

    fn put_token(&self, department: String, value: u32) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.put(department, value).await.map_err(Into::into) })
    }

    fn provision(&self, departments: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.provision(departments).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
