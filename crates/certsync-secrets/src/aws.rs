//! AWS Secrets Manager backend

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use aws_sdk_secretsmanager::Client;
use tracing::{debug, trace};

use crate::{SecretStore, SecretStoreError};

const ACCESS_DENIED_CODE: &str = "AccessDeniedException";
const THROTTLING_CODE: &str = "ThrottlingException";

/// Secret store backed by AWS Secrets Manager
pub struct AwsSecretsManagerStore {
    client: Client,
}

impl AwsSecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS configuration chain
    ///
    /// `region` overrides whatever the chain resolves (`AWS_REGION`, profile, IMDS).
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            debug!("Using AWS region override: {}", region);
            loader = loader.region(Region::new(region));
        }

        let config = loader.load().await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManagerStore {
    async fn get_secret_string(&self, name: &str) -> Result<String, SecretStoreError> {
        trace!("GetSecretValue: {}", name);

        let output = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(name, e))?;

        if let Some(value) = output.secret_string() {
            return Ok(value.to_string());
        }

        // Binary secrets are accepted when they hold UTF-8 text
        output
            .secret_binary()
            .and_then(|blob| std::str::from_utf8(blob.as_ref()).ok())
            .map(str::to_string)
            .ok_or_else(|| SecretStoreError::InvalidEncoding(name.to_string()))
    }
}

fn map_sdk_error(name: &str, err: SdkError<GetSecretValueError>) -> SecretStoreError {
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            SecretStoreError::Transport(DisplayErrorContext(&err).to_string())
        }
        // A response arrived but could not be parsed
        SdkError::ResponseError(_) => {
            SecretStoreError::Service(DisplayErrorContext(&err).to_string())
        }
        SdkError::ServiceError(ctx) => classify_service_error(name, ctx.err()),
        _ => SecretStoreError::Service(DisplayErrorContext(&err).to_string()),
    }
}

fn classify_service_error(name: &str, err: &GetSecretValueError) -> SecretStoreError {
    if err.is_resource_not_found_exception() {
        return SecretStoreError::NotFound(name.to_string());
    }
    if err.is_internal_service_error() {
        return SecretStoreError::Transport(DisplayErrorContext(err).to_string());
    }

    match err.code() {
        Some(ACCESS_DENIED_CODE) => SecretStoreError::AccessDenied(name.to_string()),
        Some(THROTTLING_CODE) => SecretStoreError::Transport(DisplayErrorContext(err).to_string()),
        _ => SecretStoreError::Service(DisplayErrorContext(err).to_string()),
    }
}
