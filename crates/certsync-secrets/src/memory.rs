//! In-memory secret store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

use crate::{SecretStore, SecretStoreError};

/// Secret store holding values in a map
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a secret
    pub fn put(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut secrets = self.secrets.write().unwrap_or_else(|e| e.into_inner());
        secrets.insert(name.into(), value.into());
    }

    /// Remove a secret, returning whether it existed
    pub fn remove(&self, name: &str) -> bool {
        let mut secrets = self.secrets.write().unwrap_or_else(|e| e.into_inner());
        secrets.remove(name).is_some()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret_string(&self, name: &str) -> Result<String, SecretStoreError> {
        trace!("Retrieving secret: {}", name);

        let secrets = self.secrets.read().unwrap_or_else(|e| e.into_inner());
        secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemorySecretStore::new();
        store.put("cert.wildcard.example.com", "{}");

        let value = store
            .get_secret_string("cert.wildcard.example.com")
            .await
            .unwrap();
        assert_eq!(value, "{}");
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let store = InMemorySecretStore::new();
        let result = store.get_secret_string("nonexistent").await;
        assert!(matches!(result, Err(SecretStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemorySecretStore::new();
        store.put("a", "1");

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.get_secret_string("a").await.is_err());
    }
}
