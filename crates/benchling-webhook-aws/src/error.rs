//! Resolution and synchronization errors

use crate::provider::AwsError;
use benchling_webhook_config::ConfigError;
use benchling_webhook_core::{mask_arn, ErrorCode, InvalidArn, Remediation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidArn(#[from] InvalidArn),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `config.json` could not be fetched or is not JSON
    #[error("Failed to fetch catalog configuration from {url}: {message}")]
    CatalogFetch { url: String, message: String },

    #[error("Stack '{stack}' not found in {region}")]
    StackNotFound { stack: String, region: String },

    #[error("Secret '{}' not found", mask_arn(.secret))]
    SecretNotFound { secret: String },

    #[error("Access denied reading secret '{}': {message}", mask_arn(.secret))]
    SecretAccessDenied { secret: String, message: String },

    #[error("Secret '{}' holds a binary value; a JSON string is required", mask_arn(.secret))]
    BinarySecret { secret: String },

    #[error("Secret '{}' is not valid JSON: {message}", mask_arn(.secret))]
    InvalidSecretJson { secret: String, message: String },

    #[error("Secret '{}' is missing required field(s): {}", mask_arn(.secret), .fields.join(", "))]
    MissingSecretField { secret: String, fields: Vec<String> },

    /// Every required output absent from the stack, reported together
    #[error("Stack '{stack}' is missing required output(s): {}", .missing.join("; "))]
    MissingOutputs { stack: String, missing: Vec<String> },

    #[error("Cannot determine catalog URL from stack '{stack}' outputs")]
    CannotDetermineCatalog { stack: String },

    #[error("{context}: {source}")]
    Aws {
        context: String,
        #[source]
        source: AwsError,
    },
}

impl ResolveError {
    pub(crate) fn aws(context: impl Into<String>, source: AwsError) -> Self {
        Self::Aws {
            context: context.into(),
            source,
        }
    }

    /// Map a Secrets Manager failure onto the secret-specific kinds.
    pub(crate) fn from_secret_call(secret: &str, err: AwsError) -> Self {
        match err {
            AwsError::NotFound { .. } => Self::SecretNotFound {
                secret: secret.to_string(),
            },
            AwsError::AccessDenied { message, .. } => Self::SecretAccessDenied {
                secret: secret.to_string(),
                message,
            },
            other => Self::aws(format!("Secrets Manager call for '{}'", mask_arn(secret)), other),
        }
    }
}

impl Remediation for ResolveError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArn(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::CatalogFetch { .. } => ErrorCode::E012CatalogFetch,
            Self::StackNotFound { .. } => ErrorCode::E002StackNotFound,
            Self::SecretNotFound { .. } => ErrorCode::E003SecretNotFound,
            Self::SecretAccessDenied { .. } => ErrorCode::E004SecretAccessDenied,
            Self::BinarySecret { .. }
            | Self::InvalidSecretJson { .. }
            | Self::MissingSecretField { .. } => ErrorCode::E005MalformedSecret,
            Self::MissingOutputs { .. } => ErrorCode::E006MissingOutputs,
            Self::CannotDetermineCatalog { .. } => ErrorCode::E011CannotDetermineCatalog,
            Self::Aws { .. } => ErrorCode::E014AwsService,
        }
    }

    fn remediation(&self) -> String {
        match self {
            Self::InvalidArn(e) => e.remediation(),
            Self::Config(e) => e.remediation(),
            Self::CatalogFetch { .. } => {
                "Check the catalog URL; it should serve /config.json (e.g. quilt.example.com)"
                    .to_string()
            }
            Self::StackNotFound { region, .. } => format!(
                "Verify the stack exists in {} and that your AWS credentials target the right account",
                region
            ),
            Self::SecretNotFound { .. } => {
                "Run `benchling-webhook sync-secrets` to create the secret, or check its ARN and region"
                    .to_string()
            }
            Self::SecretAccessDenied { .. } => {
                "Grant secretsmanager:GetSecretValue and secretsmanager:DescribeSecret on the secret"
                    .to_string()
            }
            Self::BinarySecret { .. } | Self::InvalidSecretJson { .. } => {
                "Store the secret as a JSON string with client_id, client_secret and tenant"
                    .to_string()
            }
            Self::MissingSecretField { fields, .. } => format!(
                "Add {} to the secret, or set them in the profile and re-run `benchling-webhook sync-secrets`",
                fields.join(", ")
            ),
            Self::MissingOutputs { .. } => {
                "Confirm this is a Quilt stack and that it finished deploying; outputs are read from DescribeStacks"
                    .to_string()
            }
            Self::CannotDetermineCatalog { .. } => {
                "Pass the catalog explicitly with --catalog".to_string()
            }
            Self::Aws { .. } => {
                "Check AWS credentials, region and permissions, then retry".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
