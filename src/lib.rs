//! certsync - keep a domain's TLS key and certificate chain on disk in step
//! with the bundle kept in a secret store

pub mod config;
pub mod sync;

pub use config::{ConfigError, RetryPolicy, SyncConfig};
pub use sync::{synchronize, SyncError, SyncOutcome};
