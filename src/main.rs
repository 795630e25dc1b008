//! certsync CLI - Materialize a domain's certificate bundle from AWS Secrets Manager

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use certsync::config::{self, RetryPolicy, SyncConfig, DEFAULT_SECRET_PREFIX};
use certsync::{synchronize, SyncOutcome};
use certsync_secrets::AwsSecretsManagerStore;

/// certsync - Write the certificate bundle for a domain to ~/certs
#[derive(Parser, Debug)]
#[command(name = "certsync")]
#[command(about = "Sync a domain's TLS key and certificate chain from AWS Secrets Manager")]
#[command(version)]
struct Cli {
    /// Domain whose bundle is synced
    #[arg(long, env = "CERT_DOMAIN")]
    domain: Option<String>,

    /// Base directory for certs/ (defaults to the user's home directory)
    #[arg(long, env = "CERT_HOME")]
    home_dir: Option<PathBuf>,

    /// Prefix of the secret name; the domain is appended
    #[arg(long, env = "CERT_SECRET_PREFIX", default_value = DEFAULT_SECRET_PREFIX)]
    secret_prefix: String,

    /// AWS region override
    #[arg(long, env = "CERT_AWS_REGION")]
    region: Option<String>,

    /// Retries for transient secret store failures (0 = fail immediately)
    #[arg(long, env = "CERT_MAX_RETRIES", default_value = "0")]
    max_retries: u32,

    /// Initial retry delay in milliseconds
    #[arg(long, env = "CERT_RETRY_DELAY_MS", default_value = "500")]
    retry_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("Failed to initialize logging filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    // Nothing touches the network or filesystem until the domain is known
    let domain = config::require_domain(cli.domain)?;

    let config = SyncConfig::new(domain, config::resolve_base_dir(cli.home_dir))
        .with_secret_prefix(cli.secret_prefix)
        .with_retry(RetryPolicy::new(
            cli.max_retries,
            Duration::from_millis(cli.retry_delay_ms),
        ));

    let store = AwsSecretsManagerStore::from_env(cli.region).await;

    let outcome = synchronize(&config, &store)
        .await
        .with_context(|| format!("Certificate sync for {} failed", config.domain))?;

    match outcome {
        SyncOutcome::Unchanged { key_path } => {
            info!("Key {:?} is up to date, nothing written", key_path);
        }
        SyncOutcome::Updated {
            key_path,
            cert_path,
            endpoint_count,
            ca_count,
        } => {
            info!(
                "Wrote {:?} and {:?} ({} endpoint, {} CA certificates)",
                key_path, cert_path, endpoint_count, ca_count
            );
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
