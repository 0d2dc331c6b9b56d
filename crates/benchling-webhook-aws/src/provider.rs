//! AWS control-plane abstraction
//!
//! Every CloudFormation, STS and Secrets Manager call the resolvers make goes
//! through [`AwsProvider`], so resolution logic can be replayed against
//! [`crate::mock::MockAwsProvider`] without network access.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure of a single AWS call, classified by what the caller can do about it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwsError {
    #[error("{resource} not found: {message}")]
    NotFound { resource: String, message: String },

    #[error("access denied to {resource}: {message}")]
    AccessDenied { resource: String, message: String },

    #[error("{operation} failed: {message}")]
    Service { operation: String, message: String },
}

impl AwsError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            message: "resource does not exist".to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type AwsResult<T> = std::result::Result<T, AwsError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    pub stack_name: String,
    pub stack_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResource {
    pub logical_id: String,
    pub physical_id: Option<String>,
    pub resource_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackDescription {
    pub stack_name: String,
    pub stack_id: Option<String>,
    pub outputs: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMetadata {
    pub arn: String,
    pub name: String,
}

/// Stored secret value; the webhook only understands string secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretValue {
    String(String),
    Binary(Vec<u8>),
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(_) => f.write_str("SecretValue::String(***)"),
            Self::Binary(bytes) => write!(f, "SecretValue::Binary({} bytes)", bytes.len()),
        }
    }
}

#[async_trait]
pub trait AwsProvider: Send + Sync {
    /// Stacks in a healthy, complete state.
    async fn list_stacks(&self, region: &str) -> AwsResult<Vec<StackSummary>>;

    async fn list_stack_resources(
        &self,
        region: &str,
        stack: &str,
    ) -> AwsResult<Vec<StackResource>>;

    /// Outputs and parameters of a stack, by name or ARN.
    async fn describe_stack(&self, region: &str, stack: &str) -> AwsResult<StackDescription>;

    /// Account id of the active credentials.
    async fn caller_account(&self) -> AwsResult<String>;

    async fn describe_secret(&self, region: &str, secret_id: &str) -> AwsResult<SecretMetadata>;

    async fn get_secret_value(&self, region: &str, secret_id: &str) -> AwsResult<SecretValue>;

    async fn create_secret(
        &self,
        region: &str,
        name: &str,
        value: &str,
        description: &str,
    ) -> AwsResult<SecretMetadata>;

    /// Store a new current version of an existing secret.
    async fn update_secret(&self, region: &str, secret_id: &str, value: &str) -> AwsResult<()>;
}

#[async_trait]
impl<T: AwsProvider + ?Sized> AwsProvider for &T {
    async fn list_stacks(&self, region: &str) -> AwsResult<Vec<StackSummary>> {
        (**self).list_stacks(region).await
    }

    async fn list_stack_resources(
        &self,
        region: &str,
        stack: &str,
    ) -> AwsResult<Vec<StackResource>> {
        (**self).list_stack_resources(region, stack).await
    }

    async fn describe_stack(&self, region: &str, stack: &str) -> AwsResult<StackDescription> {
        (**self).describe_stack(region, stack).await
    }

    async fn caller_account(&self) -> AwsResult<String> {
        (**self).caller_account().await
    }

    async fn describe_secret(&self, region: &str, secret_id: &str) -> AwsResult<SecretMetadata> {
        (**self).describe_secret(region, secret_id).await
    }

    async fn get_secret_value(&self, region: &str, secret_id: &str) -> AwsResult<SecretValue> {
        (**self).get_secret_value(region, secret_id).await
    }

    async fn create_secret(
        &self,
        region: &str,
        name: &str,
        value: &str,
        description: &str,
    ) -> AwsResult<SecretMetadata> {
        (**self).create_secret(region, name, value, description).await
    }

    async fn update_secret(&self, region: &str, secret_id: &str, value: &str) -> AwsResult<()> {
        (**self).update_secret(region, secret_id, value).await
    }
}
