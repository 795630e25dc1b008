//! Secret store access
//!
//! The certificate bundle lives in a named secret. [`SecretStore`] is the
//! seam between the sync routine and wherever that secret is kept:
//! AWS Secrets Manager in production, an in-memory map in tests.

pub mod aws;
pub mod memory;

pub use aws::AwsSecretsManagerStore;
pub use memory::InMemorySecretStore;

use async_trait::async_trait;
use thiserror::Error;

/// Secret store errors
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Access denied to secret: {0}")]
    AccessDenied(String),

    #[error("Secret store unreachable: {0}")]
    Transport(String),

    #[error("Secret store error: {0}")]
    Service(String),

    #[error("Secret {0} has no text value")]
    InvalidEncoding(String),
}

impl SecretStoreError {
    /// Whether a retry could succeed without anything else changing
    pub fn is_transient(&self) -> bool {
        matches!(self, SecretStoreError::Transport(_))
    }
}

/// Read access to named secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the text value of a secret
    async fn get_secret_string(&self, name: &str) -> Result<String, SecretStoreError>;
}
