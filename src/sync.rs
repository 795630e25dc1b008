//! One sync run: fetch the bundle, write it out if the local key is stale

use certsync_cert::{BundleError, CertificateBundle, MaterializeError, MaterializeOutcome};
use certsync_secrets::{SecretStore, SecretStoreError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{RetryPolicy, SyncConfig};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch secret {name}: {source}")]
    Secret {
        name: String,
        source: SecretStoreError,
    },

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// What a sync run did to the local files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The key on disk already matched the bundle
    Unchanged { key_path: PathBuf },

    /// Key and certificate files were rewritten
    Updated {
        key_path: PathBuf,
        cert_path: PathBuf,
        endpoint_count: usize,
        ca_count: usize,
    },
}

/// Bring the local key and certificate files in line with the stored bundle
pub async fn synchronize(
    config: &SyncConfig,
    store: &dyn SecretStore,
) -> Result<SyncOutcome, SyncError> {
    let secret_name = config.secret_name();
    info!("Synchronizing certificate for {} from {}", config.domain, secret_name);

    let payload = fetch_with_retry(store, &secret_name, &config.retry)
        .await
        .map_err(|source| SyncError::Secret {
            name: secret_name.clone(),
            source,
        })?;

    let bundle = CertificateBundle::from_json(&payload)?;
    if bundle.domain != config.domain {
        warn!(
            "Bundle in {} is for {}, expected {}",
            secret_name, bundle.domain, config.domain
        );
    }
    for cert in &bundle.certs {
        debug!(
            "Bundle entry: type={} not_before={:?} not_after={:?}",
            cert.cert_type,
            cert.not_before(),
            cert.not_after()
        );
    }

    let files = config.file_pair();
    debug!("Key file: {:?}, certificate file: {:?}", files.key_path, files.cert_path);

    let outcome = match files.materialize(&bundle)? {
        MaterializeOutcome::Unchanged => SyncOutcome::Unchanged {
            key_path: files.key_path,
        },
        MaterializeOutcome::Updated {
            endpoint_count,
            ca_count,
        } => SyncOutcome::Updated {
            key_path: files.key_path,
            cert_path: files.cert_path,
            endpoint_count,
            ca_count,
        },
    };

    Ok(outcome)
}

/// Fetch a secret, retrying transient failures per `policy`
async fn fetch_with_retry(
    store: &dyn SecretStore,
    name: &str,
    policy: &RetryPolicy,
) -> Result<String, SecretStoreError> {
    let mut attempt: u32 = 0;
    let mut current_delay = policy.initial_delay;

    loop {
        match store.get_secret_string(name).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    "Fetching {} failed: {}. Retrying in {:?} (attempt {} of {})",
                    name, e, current_delay, attempt, policy.max_retries
                );

                tokio::time::sleep(current_delay).await;
                current_delay = policy.next_delay(current_delay);
            }
            Err(e) => return Err(e),
        }
    }
}
