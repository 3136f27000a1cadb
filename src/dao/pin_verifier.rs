use std::{error::Error, sync::Arc};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::config::AppConfig;

/// Result alias for verifier calls.
pub type VerifierResult<T> = Result<T, VerifierError>;

/// Error raised when the PIN verifier cannot produce a verdict.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("PIN verifier unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl VerifierError {
    /// Construct an unavailable error from any verifier failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        VerifierError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Yes/no PIN check for a department.
///
/// A `false` verdict must not reveal whether the department exists; unknown
/// departments simply fail verification.
pub trait PinVerifier: Send + Sync {
    fn verify(&self, department: String, pin: String) -> BoxFuture<'static, VerifierResult<bool>>;
}

/// [`PinVerifier`] backed by the static department registry.
#[derive(Clone)]
pub struct RegistryPinVerifier {
    config: Arc<AppConfig>,
}

impl RegistryPinVerifier {
    /// Build a verifier over the loaded registry.
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl PinVerifier for RegistryPinVerifier {
    fn verify(&self, department: String, pin: String) -> BoxFuture<'static, VerifierResult<bool>> {
        let verifier = self.clone();
        Box::pin(async move {
            Ok(verifier
                .config
                .department(&department)
                .is_some_and(|dept| dept.pin() == pin))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> RegistryPinVerifier {
        RegistryPinVerifier::new(Arc::new(AppConfig::default()))
    }

    #[tokio::test]
    async fn accepts_matching_pin() {
        assert!(
            verifier()
                .verify("cs".into(), "1234".into())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn rejects_wrong_pin() {
        assert!(
            !verifier()
                .verify("cs".into(), "0000".into())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn unknown_department_fails_without_error() {
        assert!(
            !verifier()
                .verify("zz".into(), "1234".into())
                .await
                .unwrap()
        );
    }
}
