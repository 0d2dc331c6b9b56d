//! AWS SDK implementation of [`AwsProvider`]

use crate::provider::{
    AwsError, AwsProvider, AwsResult, SecretMetadata, SecretValue, StackDescription,
    StackResource, StackSummary,
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::StackStatus;
use tracing::{debug, instrument};

/// Stacks considered live when searching for a catalog's backing stack.
const ACTIVE_STATUSES: [StackStatus; 4] = [
    StackStatus::CreateComplete,
    StackStatus::UpdateComplete,
    StackStatus::UpdateRollbackComplete,
    StackStatus::ImportComplete,
];

/// SDK getters return `&str` for required members and `Option<&str>` otherwise.
trait OptStr<'a> {
    fn opt(self) -> Option<&'a str>;
}

impl<'a> OptStr<'a> for &'a str {
    fn opt(self) -> Option<&'a str> {
        Some(self)
    }
}

impl<'a> OptStr<'a> for Option<&'a str> {
    fn opt(self) -> Option<&'a str> {
        self
    }
}

fn owned<'a>(value: impl OptStr<'a>) -> String {
    value.opt().unwrap_or_default().to_string()
}

/// Classify an SDK error by its service error code.
fn classify<E>(operation: &str, resource: &str, err: E) -> AwsError
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    let code = err.code().unwrap_or_default().to_string();
    let message = err.message().map(str::to_string).unwrap_or_else(|| err.to_string());
    debug!(operation, resource, code = %code, "AWS call failed");

    match code.as_str() {
        "ResourceNotFoundException" => AwsError::NotFound {
            resource: resource.to_string(),
            message,
        },
        // CloudFormation reports missing stacks as a validation error.
        "ValidationError" if message.contains("does not exist") => AwsError::NotFound {
            resource: resource.to_string(),
            message,
        },
        "AccessDenied" | "AccessDeniedException" | "UnauthorizedOperation" => {
            AwsError::AccessDenied {
                resource: resource.to_string(),
                message,
            }
        }
        _ => AwsError::Service {
            operation: operation.to_string(),
            message: if code.is_empty() {
                message
            } else {
                format!("{}: {}", code, message)
            },
        },
    }
}

/// Provider backed by the AWS SDK, building a client per requested region.
#[derive(Debug, Clone)]
pub struct SdkAwsProvider {
    config: SdkConfig,
}

impl SdkAwsProvider {
    /// Load shared configuration from the default chain (env, profile, IMDS).
    pub async fn load(profile: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        Self {
            config: loader.load().await,
        }
    }

    pub fn from_config(config: SdkConfig) -> Self {
        Self { config }
    }

    /// Region from the loaded configuration, if any.
    pub fn default_region(&self) -> Option<String> {
        self.config.region().map(|r| r.to_string())
    }

    fn cloudformation(&self, region: &str) -> aws_sdk_cloudformation::Client {
        let conf = aws_sdk_cloudformation::config::Builder::from(&self.config)
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_cloudformation::Client::from_conf(conf)
    }

    fn secrets(&self, region: &str) -> aws_sdk_secretsmanager::Client {
        let conf = aws_sdk_secretsmanager::config::Builder::from(&self.config)
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_secretsmanager::Client::from_conf(conf)
    }
}

#[async_trait]
impl AwsProvider for SdkAwsProvider {
    #[instrument(skip(self))]
    async fn list_stacks(&self, region: &str) -> AwsResult<Vec<StackSummary>> {
        let client = self.cloudformation(region);
        let mut stacks = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .list_stacks()
                .set_stack_status_filter(Some(ACTIVE_STATUSES.to_vec()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListStacks", region, e))?;

            for summary in response.stack_summaries() {
                stacks.push(StackSummary {
                    stack_name: owned(summary.stack_name()),
                    stack_id: summary.stack_id().opt().map(str::to_string),
                });
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        debug!(count = stacks.len(), "Listed stacks");
        Ok(stacks)
    }

    #[instrument(skip(self))]
    async fn list_stack_resources(
        &self,
        region: &str,
        stack: &str,
    ) -> AwsResult<Vec<StackResource>> {
        let client = self.cloudformation(region);
        let mut resources = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .list_stack_resources()
                .stack_name(stack)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListStackResources", stack, e))?;

            for resource in response.stack_resource_summaries() {
                resources.push(StackResource {
                    logical_id: owned(resource.logical_resource_id()),
                    physical_id: resource.physical_resource_id().opt().map(str::to_string),
                    resource_type: owned(resource.resource_type()),
                });
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(resources)
    }

    #[instrument(skip(self))]
    async fn describe_stack(&self, region: &str, stack: &str) -> AwsResult<StackDescription> {
        let response = self
            .cloudformation(region)
            .describe_stacks()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| classify("DescribeStacks", stack, e))?;

        let found = response
            .stacks()
            .first()
            .ok_or_else(|| AwsError::not_found(format!("stack {}", stack)))?;

        let mut description = StackDescription {
            stack_name: owned(found.stack_name()),
            stack_id: found.stack_id().opt().map(str::to_string),
            ..Default::default()
        };
        for output in found.outputs() {
            if let (Some(key), Some(value)) = (output.output_key(), output.output_value()) {
                description
                    .outputs
                    .insert(key.to_string(), value.to_string());
            }
        }
        for parameter in found.parameters() {
            if let (Some(key), Some(value)) =
                (parameter.parameter_key(), parameter.parameter_value())
            {
                description
                    .parameters
                    .insert(key.to_string(), value.to_string());
            }
        }
        Ok(description)
    }

    #[instrument(skip(self))]
    async fn caller_account(&self) -> AwsResult<String> {
        let response = aws_sdk_sts::Client::new(&self.config)
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| classify("GetCallerIdentity", "caller identity", e))?;
        response
            .account()
            .map(str::to_string)
            .ok_or_else(|| AwsError::Service {
                operation: "GetCallerIdentity".to_string(),
                message: "response has no account".to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn describe_secret(&self, region: &str, secret_id: &str) -> AwsResult<SecretMetadata> {
        let response = self
            .secrets(region)
            .describe_secret()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| classify("DescribeSecret", secret_id, e))?;
        Ok(SecretMetadata {
            arn: response.arn().unwrap_or(secret_id).to_string(),
            name: response.name().unwrap_or(secret_id).to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn get_secret_value(&self, region: &str, secret_id: &str) -> AwsResult<SecretValue> {
        let response = self
            .secrets(region)
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| classify("GetSecretValue", secret_id, e))?;

        if let Some(value) = response.secret_string() {
            return Ok(SecretValue::String(value.to_string()));
        }
        if let Some(blob) = response.secret_binary() {
            return Ok(SecretValue::Binary(blob.as_ref().to_vec()));
        }
        Err(AwsError::Service {
            operation: "GetSecretValue".to_string(),
            message: format!("secret {} has no value", secret_id),
        })
    }

    #[instrument(skip(self, value))]
    async fn create_secret(
        &self,
        region: &str,
        name: &str,
        value: &str,
        description: &str,
    ) -> AwsResult<SecretMetadata> {
        let response = self
            .secrets(region)
            .create_secret()
            .name(name)
            .description(description)
            .secret_string(value)
            .send()
            .await
            .map_err(|e| classify("CreateSecret", name, e))?;
        Ok(SecretMetadata {
            arn: response.arn().unwrap_or_default().to_string(),
            name: response.name().unwrap_or(name).to_string(),
        })
    }

    #[instrument(skip(self, value))]
    async fn update_secret(&self, region: &str, secret_id: &str, value: &str) -> AwsResult<()> {
        self.secrets(region)
            .put_secret_value()
            .secret_id(secret_id)
            .secret_string(value)
            .send()
            .await
            .map_err(|e| classify("PutSecretValue", secret_id, e))?;
        Ok(())
    }
}
