//! Error types for profile persistence and configuration loading

use benchling_webhook_core::{ErrorCode, Remediation};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The profile (or one of its documents) does not exist on disk
    #[error("Profile '{profile}' not found: expected {}", .path.display())]
    NotFound { profile: String, path: PathBuf },

    /// The document exists but is not valid JSON
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A dotenv file could not be parsed
    #[error("Failed to parse dotenv file {}: {source}", .path.display())]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    /// The document is valid JSON but does not describe a profile
    #[error("Schema violation in {location}: {message}")]
    Schema { location: String, message: String },

    /// Reading or writing a file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The profile may not be removed
    #[error("Profile '{profile}' is protected and cannot be deleted")]
    ProfileProtected { profile: String },

    /// Profile names become directory names
    #[error("Invalid profile name '{name}': use letters, digits, '-' and '_' only")]
    InvalidProfileName { name: String },

    /// `--benchling-secrets` could not be interpreted
    #[error("Invalid Benchling secrets input: {message}")]
    SecretsInput { message: String },

    /// One or more configuration fields are unusable
    #[error("Invalid configuration:\n  - {}", .errors.join("\n  - "))]
    Invalid { errors: Vec<String> },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn schema(location: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Schema {
            location: location.to_string(),
            message: message.into(),
        }
    }
}

impl Remediation for ConfigError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::E007ConfigNotFound,
            Self::Parse { .. } | Self::Dotenv { .. } | Self::Io { .. } => {
                ErrorCode::E008ConfigParse
            }
            Self::Schema { .. } | Self::InvalidProfileName { .. } => ErrorCode::E009ConfigSchema,
            Self::ProfileProtected { .. } => ErrorCode::E013ProfileProtected,
            Self::SecretsInput { .. } | Self::Invalid { .. } => ErrorCode::E010Validation,
        }
    }

    fn remediation(&self) -> String {
        match self {
            Self::NotFound { profile, .. } => format!(
                "Run `benchling-webhook init --profile {}` to create it, or `benchling-webhook profile list` to see existing profiles",
                profile
            ),
            Self::Parse { path, .. } => format!(
                "Fix the JSON syntax in {} or restore it from the config.backup-*.json file beside it",
                path.display()
            ),
            Self::Dotenv { path, .. } => format!(
                "Use KEY=value lines in {}; quote values containing spaces",
                path.display()
            ),
            Self::Schema { .. } => {
                "Re-run `benchling-webhook init` for this profile or correct the named field".to_string()
            }
            Self::Io { path, .. } => format!("Check that {} is readable and writable", path.display()),
            Self::ProfileProtected { .. } => {
                "Edit the default profile instead of deleting it".to_string()
            }
            Self::InvalidProfileName { .. } => {
                "Choose a profile name such as 'dev' or 'prod_us'".to_string()
            }
            Self::SecretsInput { .. } => {
                "Pass a Secrets Manager ARN, a JSON object with client_id/client_secret/tenant, or @path/to/file.json".to_string()
            }
            Self::Invalid { .. } => "Correct the listed fields and try again".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
