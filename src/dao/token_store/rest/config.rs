use super::error::{RestDaoError, RestResult};

/// Runtime configuration describing how to reach the PostgREST-style tokens API.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl RestConfig {
    /// Construct a configuration from an explicit REST root URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Attach the API key sent as both `apikey` and bearer token headers.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> RestResult<Self> {
        let base_url = std::env::var("TOKEN_API_URL").map_err(|_| RestDaoError::MissingEnvVar {
            var: "TOKEN_API_URL",
        })?;

        let mut config = Self::new(base_url);

        if let Ok(api_key) = std::env::var("TOKEN_API_KEY") {
            config = config.with_api_key(api_key);
        }

        Ok(config)
    }
}
