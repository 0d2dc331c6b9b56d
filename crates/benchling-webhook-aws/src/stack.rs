//! Catalog-to-stack discovery
//!
//! 1. Fetch `<catalog>/config.json`, retrying once at the bare origin on 403/404.
//! 2. Pull the API Gateway id out of `apiGatewayEndpoint`.
//! 3. Find the stack whose `AWS::ApiGateway::RestApi` has that physical id.
//! 4. Describe it and derive deployment variables from its outputs.
//!
//! Fetch and parse failures are fatal. Failing to locate the stack is not: the
//! result simply carries no stack and fewer inferred values.

use crate::error::{ResolveError, Result};
use crate::http::HttpClient;
use crate::provider::{AwsProvider, StackDescription};
use benchling_webhook_config::{normalize_catalog, InferenceResult};
use benchling_webhook_core::arn::{is_queue_url, parse_stack_arn};
use benchling_webhook_core::StackArn;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};
use url::Url;

const REST_API_TYPE: &str = "AWS::ApiGateway::RestApi";

/// Output keys holding the Athena database, most specific first.
pub const DATABASE_OUTPUTS: &[&str] = &["UserAthenaDatabaseName", "AthenaDatabase", "Database"];
/// Output keys holding the packager queue URL; `QueueUrl` is the legacy name.
pub const QUEUE_URL_OUTPUTS: &[&str] = &["PackagerQueueUrl", "QueueUrl"];
/// Output keys holding the user bucket; renamed between Quilt releases.
pub const BUCKET_OUTPUTS: &[&str] = &["UserBucket", "BucketName"];

/// First present, non-empty output among `keys`.
pub fn first_output<'a>(outputs: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| outputs.get(*key))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// API Gateway id and region from `https://{id}.execute-api.{region}.amazonaws.com/...`.
pub fn parse_api_gateway_endpoint(endpoint: &str) -> Option<(String, String)> {
    let url = Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    let labels: Vec<&str> = host.split('.').collect();
    match labels.as_slice() {
        [id, "execute-api", region, "amazonaws", "com"] if !id.is_empty() => {
            Some((id.to_string(), region.to_string()))
        }
        _ => None,
    }
}

/// Everything learned about a catalog's backing stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackInference {
    /// URL `config.json` was actually served from
    pub config_url: String,
    /// Bare catalog host
    pub catalog_domain: String,
    pub region: Option<String>,
    pub api_gateway_id: Option<String>,
    pub stack_name: Option<String>,
    pub stack_arn: Option<String>,
    pub account: Option<String>,
    pub outputs: BTreeMap<String, String>,
    pub parameters: BTreeMap<String, String>,
    /// Deployment variables keyed by environment-variable name
    pub inferred: BTreeMap<String, String>,
}

impl StackInference {
    pub fn to_inference_result(&self, source: &str) -> InferenceResult {
        InferenceResult {
            catalog_url: self.catalog_domain.clone(),
            quilt_stack_arn: self.stack_arn.clone(),
            quilt_user_bucket: first_output(&self.outputs, BUCKET_OUTPUTS).map(str::to_string),
            queue_arn: self.outputs.get("PackagerQueueArn").cloned(),
            quilt_region: self.region.clone(),
            source: source.to_string(),
        }
    }
}

pub struct StackOutputResolver<H: HttpClient, P: AwsProvider> {
    http: H,
    aws: P,
}

impl<H: HttpClient, P: AwsProvider> StackOutputResolver<H, P> {
    pub fn new(http: H, aws: P) -> Self {
        Self { http, aws }
    }

    pub fn provider(&self) -> &P {
        &self.aws
    }

    /// Fetch and parse the catalog's `config.json`.
    #[instrument(skip(self))]
    pub async fn fetch_catalog_config(&self, catalog: &str) -> Result<(Value, Url)> {
        let root = catalog_root(catalog)?;
        let primary = format!("{}/config.json", root.as_str().trim_end_matches('/'));
        let fallback = format!("{}/config.json", root.origin().ascii_serialization());

        let mut url = primary;
        let mut response = self.get(&url).await?;
        if matches!(response.status, 403 | 404) && fallback != url {
            debug!(status = response.status, retry = %fallback, "Retrying config.json at origin");
            url = fallback;
            response = self.get(&url).await?;
        }

        if !response.is_success() {
            return Err(ResolveError::CatalogFetch {
                url,
                message: format!("HTTP {}", response.status),
            });
        }
        let config: Value = response.json().map_err(|e| ResolveError::CatalogFetch {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let fetched = Url::parse(&url).map_err(|e| ResolveError::CatalogFetch {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok((config, fetched))
    }

    async fn get(&self, url: &str) -> Result<crate::http::HttpResponse> {
        self.http
            .get(url)
            .await
            .map_err(|e| ResolveError::CatalogFetch {
                url: url.to_string(),
                message: format!("{:#}", e),
            })
    }

    /// Name of the stack owning the REST API `api_id`, if any.
    ///
    /// Listing failures degrade to `None`.
    #[instrument(skip(self))]
    pub async fn find_stack_by_api_id(&self, region: &str, api_id: &str) -> Option<String> {
        let stacks = match self.aws.list_stacks(region).await {
            Ok(stacks) => stacks,
            Err(e) => {
                warn!(error = %e, "Could not list stacks");
                return None;
            }
        };

        for stack in stacks {
            let resources = match self.aws.list_stack_resources(region, &stack.stack_name).await {
                Ok(resources) => resources,
                Err(e) => {
                    debug!(stack = %stack.stack_name, error = %e, "Skipping stack");
                    continue;
                }
            };
            let owns_api = resources.iter().any(|r| {
                r.resource_type == REST_API_TYPE && r.physical_id.as_deref() == Some(api_id)
            });
            if owns_api {
                return Some(stack.stack_name);
            }
        }
        None
    }

    /// Describe a stack by ARN in the ARN's region.
    #[instrument(skip(self))]
    pub async fn describe_stack_arn(&self, stack_arn: &str) -> Result<StackDescription> {
        describe_by_arn(&self.aws, stack_arn)
            .await
            .map(|(_, description)| description)
    }

    /// Discover the stack behind a catalog and derive deployment variables.
    #[instrument(skip(self))]
    pub async fn infer(&self, catalog: &str) -> Result<StackInference> {
        let (config, fetched) = self.fetch_catalog_config(catalog).await?;
        let catalog_domain = fetched.host_str().unwrap_or_default().to_string();

        let endpoint = config
            .get("apiGatewayEndpoint")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let api = parse_api_gateway_endpoint(endpoint);
        if api.is_none() {
            warn!(endpoint, "apiGatewayEndpoint has no recognizable API id");
        }

        let region = config
            .get("region")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or_else(|| api.as_ref().map(|(_, region)| region.clone()));

        let mut inference = StackInference {
            config_url: fetched.to_string(),
            catalog_domain,
            region,
            api_gateway_id: api.as_ref().map(|(id, _)| id.clone()),
            ..Default::default()
        };

        if let (Some(api_id), Some(region)) = (&inference.api_gateway_id, &inference.region) {
            inference.stack_name = self.find_stack_by_api_id(region, api_id).await;
        }

        match (&inference.stack_name, &inference.region) {
            (Some(name), Some(region)) => match self.aws.describe_stack(region, name).await {
                Ok(description) => {
                    info!(stack = %name, outputs = description.outputs.len(), "Found Quilt stack");
                    inference.stack_arn = description.stack_id;
                    inference.outputs = description.outputs;
                    inference.parameters = description.parameters;
                }
                Err(e) => warn!(stack = %name, error = %e, "Could not describe stack"),
            },
            _ => warn!(catalog = %inference.catalog_domain, "No stack found for catalog; continuing without stack outputs"),
        }

        match self.aws.caller_account().await {
            Ok(account) => inference.account = Some(account),
            Err(e) => debug!(error = %e, "Caller account unavailable"),
        }

        inference.inferred = build_inferred_vars(&inference);
        Ok(inference)
    }
}

/// Parse `stack_arn` and describe the stack in its own region.
pub(crate) async fn describe_by_arn<P: AwsProvider>(
    aws: &P,
    stack_arn: &str,
) -> Result<(StackArn, StackDescription)> {
    let parsed = parse_stack_arn(stack_arn)?;
    match aws.describe_stack(&parsed.region, stack_arn).await {
        Ok(description) => Ok((parsed, description)),
        Err(e) if e.is_not_found() => Err(ResolveError::StackNotFound {
            stack: parsed.stack_name,
            region: parsed.region,
        }),
        Err(e) => Err(ResolveError::aws(
            format!("DescribeStacks for {}", parsed.stack_name),
            e,
        )),
    }
}

fn catalog_root(catalog: &str) -> Result<Url> {
    let trimmed = catalog.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    Url::parse(&with_scheme).map_err(|e| ResolveError::CatalogFetch {
        url: with_scheme.clone(),
        message: e.to_string(),
    })
}

/// Deployment variables keyed by the environment-variable names `validate` understands.
fn build_inferred_vars(inference: &StackInference) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let outputs = &inference.outputs;

    vars.insert(
        "QUILT_CATALOG".to_string(),
        normalize_catalog(&inference.catalog_domain),
    );

    let database = first_output(outputs, DATABASE_OUTPUTS)
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{}_db  # VERIFY THIS",
                inference.catalog_domain.replace(['.', '-'], "_")
            )
        });
    vars.insert("QUILT_DATABASE".to_string(), database);

    if let Some(queue) = first_output(outputs, QUEUE_URL_OUTPUTS).filter(|q| is_queue_url(q)) {
        vars.insert("QUEUE_URL".to_string(), queue.to_string());
    }
    if let Some(bucket) = first_output(outputs, BUCKET_OUTPUTS) {
        vars.insert("QUILT_USER_BUCKET".to_string(), bucket.to_string());
    }
    if let Some(region) = &inference.region {
        vars.insert("CDK_DEFAULT_REGION".to_string(), region.clone());
    }
    if let Some(account) = &inference.account {
        vars.insert("CDK_DEFAULT_ACCOUNT".to_string(), account.clone());
    }
    if let Some(arn) = &inference.stack_arn {
        vars.insert("QUILT_STACK_ARN".to_string(), arn.clone());
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAwsProvider, MockHttpClient};
    use crate::provider::{AwsError, StackResource};
    use serde_json::json;

    const STACK_ARN: &str =
        "arn:aws:cloudformation:us-east-1:123456789012:stack/QuiltStack/abc-123";

    fn quilt_stack(outputs: &[(&str, &str)]) -> StackDescription {
        StackDescription {
            stack_name: "QuiltStack".to_string(),
            stack_id: Some(STACK_ARN.to_string()),
            outputs: outputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            parameters: BTreeMap::new(),
        }
    }

    fn rest_api(id: &str) -> Vec<StackResource> {
        vec![StackResource {
            logical_id: "Api".to_string(),
            physical_id: Some(id.to_string()),
            resource_type: REST_API_TYPE.to_string(),
        }]
    }

    fn catalog_http() -> MockHttpClient {
        MockHttpClient::new().with_json(
            "https://quilt.example.com/config.json",
            json!({
                "region": "us-east-1",
                "apiGatewayEndpoint": "https://a1b2c3.execute-api.us-east-1.amazonaws.com/prod"
            }),
        )
    }

    #[test]
    fn test_parse_api_gateway_endpoint() {
        assert_eq!(
            parse_api_gateway_endpoint("https://a1b2c3.execute-api.us-west-2.amazonaws.com/prod"),
            Some(("a1b2c3".to_string(), "us-west-2".to_string()))
        );
        assert_eq!(parse_api_gateway_endpoint("https://api.example.com"), None);
        assert_eq!(parse_api_gateway_endpoint(""), None);
    }

    #[tokio::test]
    async fn test_infer_finds_stack_and_outputs() {
        let aws = MockAwsProvider::new()
            .with_account("123456789012")
            .with_stack(
                "us-east-1",
                StackDescription {
                    stack_name: "Other".to_string(),
                    ..Default::default()
                },
                rest_api("zzz"),
            )
            .with_stack(
            "us-east-1",
            quilt_stack(&[
                ("UserAthenaDatabaseName", "quilt_db"),
                ("AthenaDatabase", "ignored_db"),
                ("PackagerQueueUrl", "https://sqs.us-east-1.amazonaws.com/123456789012/pkg"),
                ("UserBucket", "quilt-user"),
            ]),
            rest_api("a1b2c3"),
        );
        let resolver = StackOutputResolver::new(catalog_http(), aws);

        let inference = resolver.infer("https://quilt.example.com/").await.unwrap();
        assert_eq!(inference.stack_name.as_deref(), Some("QuiltStack"));
        assert_eq!(inference.inferred["QUILT_CATALOG"], "quilt.example.com");
        assert_eq!(inference.inferred["QUILT_DATABASE"], "quilt_db");
        assert_eq!(
            inference.inferred["QUEUE_URL"],
            "https://sqs.us-east-1.amazonaws.com/123456789012/pkg"
        );
        assert_eq!(inference.inferred["CDK_DEFAULT_ACCOUNT"], "123456789012");
        assert_eq!(inference.inferred["QUILT_USER_BUCKET"], "quilt-user");
    }

    #[tokio::test]
    async fn test_retry_at_origin_on_404() {
        let http = MockHttpClient::new()
            .with_response("https://quilt.example.com/b/data/config.json", 403, b"")
            .with_json(
                "https://quilt.example.com/config.json",
                json!({"apiGatewayEndpoint": null}),
            );
        let resolver = StackOutputResolver::new(http.clone(), MockAwsProvider::new());

        let (_, fetched) = resolver
            .fetch_catalog_config("quilt.example.com/b/data")
            .await
            .unwrap();
        assert_eq!(fetched.as_str(), "https://quilt.example.com/config.json");
        assert_eq!(http.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_other_status_is_fatal() {
        let http = MockHttpClient::new().with_response(
            "https://quilt.example.com/config.json",
            500,
            b"oops",
        );
        let resolver = StackOutputResolver::new(http.clone(), MockAwsProvider::new());
        let err = resolver.infer("quilt.example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::CatalogFetch { .. }));
        assert_eq!(http.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_non_json_body_is_fatal() {
        let http = MockHttpClient::new().with_response(
            "https://quilt.example.com/config.json",
            200,
            b"<html></html>",
        );
        let resolver = StackOutputResolver::new(http, MockAwsProvider::new());
        assert!(matches!(
            resolver.infer("quilt.example.com").await.unwrap_err(),
            ResolveError::CatalogFetch { .. }
        ));
    }

    #[tokio::test]
    async fn test_degraded_mode_without_stack() {
        let aws = MockAwsProvider::new().fail(
            "caller_account",
            AwsError::Service {
                operation: "GetCallerIdentity".to_string(),
                message: "expired".to_string(),
            },
        );
        let resolver = StackOutputResolver::new(catalog_http(), aws);

        let inference = resolver.infer("quilt.example.com").await.unwrap();
        assert!(inference.stack_name.is_none());
        assert!(inference.account.is_none());
        assert_eq!(
            inference.inferred["QUILT_DATABASE"],
            "quilt_example_com_db  # VERIFY THIS"
        );
        assert!(!inference.inferred.contains_key("QUEUE_URL"));
        assert!(!inference.inferred.contains_key("CDK_DEFAULT_ACCOUNT"));
    }

    #[tokio::test]
    async fn test_legacy_queue_output_must_be_sqs_url() {
        let aws = MockAwsProvider::new().with_stack(
            "us-east-1",
            quilt_stack(&[("QueueUrl", "not-a-queue")]),
            rest_api("a1b2c3"),
        );
        let resolver = StackOutputResolver::new(catalog_http(), aws);
        let inference = resolver.infer("quilt.example.com").await.unwrap();
        assert!(!inference.inferred.contains_key("QUEUE_URL"));
    }

    #[tokio::test]
    async fn test_describe_missing_stack_arn() {
        let resolver = StackOutputResolver::new(MockHttpClient::new(), MockAwsProvider::new());
        let err = resolver.describe_stack_arn(STACK_ARN).await.unwrap_err();
        assert!(matches!(err, ResolveError::StackNotFound { .. }));
    }
}
