//! Sync configuration
//!
//! The binary resolves everything from flags and environment once; the sync
//! routine only ever sees a [`SyncConfig`].

use certsync_cert::LocalFilePair;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Prefix of the secret holding a domain's bundle
pub const DEFAULT_SECRET_PREFIX: &str = "cert.wildcard.";

/// Base directory used when the home directory cannot be resolved
pub const FALLBACK_HOME: &str = "/root";

/// Upper bound for the retry backoff
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CERT_DOMAIN environment must be present")]
    MissingDomain,
}

/// Check that a domain was supplied and is not empty
pub fn require_domain(domain: Option<String>) -> Result<String, ConfigError> {
    match domain {
        Some(domain) if !domain.trim().is_empty() => Ok(domain),
        _ => Err(ConfigError::MissingDomain),
    }
}

/// Pick the base directory for `certs/`
///
/// An explicit override wins, then the user's home directory, then [`FALLBACK_HOME`].
pub fn resolve_base_dir(override_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir;
    }

    dirs::home_dir().unwrap_or_else(|| {
        warn!("User home is not defined, defaulting to {}", FALLBACK_HOME);
        PathBuf::from(FALLBACK_HOME)
    })
}

/// Bounded retries for transient secret store failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Fail on the first error
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// `initial_delay` is clamped to [`MAX_RETRY_DELAY`]
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: initial_delay.min(MAX_RETRY_DELAY),
            max_delay: MAX_RETRY_DELAY,
        }
    }

    /// Delay before the next attempt, doubled and capped
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

/// Everything one sync run needs
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub domain: String,
    pub base_dir: PathBuf,
    pub secret_prefix: String,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    pub fn new(domain: String, base_dir: PathBuf) -> Self {
        Self {
            domain,
            base_dir,
            secret_prefix: DEFAULT_SECRET_PREFIX.to_string(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_secret_prefix(mut self, prefix: String) -> Self {
        self.secret_prefix = prefix;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Name of the secret holding this domain's bundle
    pub fn secret_name(&self) -> String {
        format!("{}{}", self.secret_prefix, self.domain)
    }

    pub fn file_pair(&self) -> LocalFilePair {
        LocalFilePair::new(&self.base_dir, &self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_domain() {
        assert_eq!(
            require_domain(Some("example.com".to_string())).unwrap(),
            "example.com"
        );
        assert!(matches!(
            require_domain(None),
            Err(ConfigError::MissingDomain)
        ));
        assert!(matches!(
            require_domain(Some(String::new())),
            Err(ConfigError::MissingDomain)
        ));
    }

    #[test]
    fn test_resolve_base_dir_override() {
        let dir = resolve_base_dir(Some(PathBuf::from("/srv/tls")));
        assert_eq!(dir, PathBuf::from("/srv/tls"));
    }

    #[test]
    fn test_secret_name_and_paths() {
        let config = SyncConfig::new("example.com".to_string(), PathBuf::from("/home/op"));
        assert_eq!(config.secret_name(), "cert.wildcard.example.com");

        let pair = config.file_pair();
        assert_eq!(pair.key_path, PathBuf::from("/home/op/certs/example.com.key"));
        assert_eq!(pair.cert_path, PathBuf::from("/home/op/certs/example.com.crt"));

        let config = config.with_secret_prefix("tls/".to_string());
        assert_eq!(config.secret_name(), "tls/example.com");
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        assert_eq!(
            policy.next_delay(Duration::from_secs(10)),
            Duration::from_secs(20)
        );
        assert_eq!(policy.next_delay(Duration::from_secs(20)), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_retry_initial_delay_is_clamped() {
        let policy = RetryPolicy::new(1, Duration::from_millis(u64::MAX));
        assert_eq!(policy.initial_delay, MAX_RETRY_DELAY);
    }

    #[test]
    fn test_retry_backoff_does_not_overflow() {
        let policy = RetryPolicy::new(1, Duration::from_secs(1));
        assert_eq!(policy.next_delay(Duration::MAX), MAX_RETRY_DELAY);
    }
}
