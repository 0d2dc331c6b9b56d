//! Runtime configuration from a stack ARN plus a secret reference
//!
//! Results are memoized per `(stack ARN, secret reference)` in process. The
//! cache is never invalidated except by [`ConfigResolver::clear_cache`].

use crate::error::{ResolveError, Result};
use crate::provider::{AwsProvider, StackDescription};
use crate::secret::SecretResolver;
use crate::stack::{describe_by_arn, first_output, BUCKET_OUTPUTS, DATABASE_OUTPUTS};
use benchling_webhook_config::normalize_catalog;
use benchling_webhook_core::arn::{is_queue_url, queue_url_from_arn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

const QUEUE_OUTPUTS: &[&str] = &["PackagerQueueUrl", "PackagerQueueArn", "QueueUrl"];

/// Fully resolved configuration for the webhook runtime
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub aws_region: String,
    pub aws_account: String,
    pub quilt_stack_arn: String,
    pub quilt_catalog: String,
    pub quilt_database: String,
    pub quilt_user_bucket: String,
    pub queue_url: String,
    pub benchling_tenant: String,
    pub benchling_client_id: String,
    #[serde(skip_serializing)]
    pub benchling_client_secret: String,
    pub benchling_app_definition_id: Option<String>,
    pub pkg_prefix: String,
    pub pkg_key: String,
    pub log_level: String,
    pub enable_webhook_verification: bool,
    pub webhook_allow_list: Option<String>,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("aws_region", &self.aws_region)
            .field("aws_account", &self.aws_account)
            .field("quilt_catalog", &self.quilt_catalog)
            .field("quilt_database", &self.quilt_database)
            .field("quilt_user_bucket", &self.quilt_user_bucket)
            .field("queue_url", &self.queue_url)
            .field("benchling_tenant", &self.benchling_tenant)
            .field("benchling_client_id", &self.benchling_client_id)
            .field("benchling_client_secret", &"***")
            .field("benchling_app_definition_id", &self.benchling_app_definition_id)
            .field("pkg_prefix", &self.pkg_prefix)
            .field("pkg_key", &self.pkg_key)
            .field("log_level", &self.log_level)
            .field("enable_webhook_verification", &self.enable_webhook_verification)
            .finish()
    }
}

/// Catalog host from `Catalog`, then `CatalogDomain`, then the host of
/// `ApiGatewayEndpoint`.
pub fn catalog_from_outputs(stack: &StackDescription) -> Option<String> {
    let outputs = &stack.outputs;
    if let Some(catalog) = first_output(outputs, &["Catalog"]) {
        return Some(normalize_catalog(catalog));
    }
    if let Some(domain) = first_output(outputs, &["CatalogDomain"]) {
        return Some(normalize_catalog(domain));
    }
    first_output(outputs, &["ApiGatewayEndpoint"])
        .and_then(|endpoint| url::Url::parse(endpoint).ok())
        .and_then(|url| url.host_str().map(str::to_string))
}

fn queue_from_outputs(stack: &StackDescription) -> Option<String> {
    let outputs = &stack.outputs;
    if let Some(url) = first_output(outputs, &["PackagerQueueUrl"]).filter(|u| is_queue_url(u)) {
        return Some(url.to_string());
    }
    if let Some(url) = first_output(outputs, &["PackagerQueueArn"]).and_then(queue_url_from_arn) {
        return Some(url);
    }
    first_output(outputs, &["QueueUrl"])
        .filter(|u| is_queue_url(u))
        .map(str::to_string)
}

type CacheKey = (String, String);

pub struct ConfigResolver<P: AwsProvider> {
    aws: P,
    cache: Mutex<HashMap<CacheKey, Arc<ResolvedConfig>>>,
}

impl<P: AwsProvider> ConfigResolver<P> {
    pub fn new(aws: P) -> Self {
        Self {
            aws,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn cached(&self, key: &CacheKey) -> Option<Arc<ResolvedConfig>> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Resolve once per `(stack_arn, secret_ref)`; repeat calls return the same `Arc`.
    ///
    /// Concurrent calls with the same inputs may both resolve; the first to
    /// finish populates the cache.
    #[instrument(skip(self, secret_ref), fields(stack = %stack_arn))]
    pub async fn resolve(&self, stack_arn: &str, secret_ref: &str) -> Result<Arc<ResolvedConfig>> {
        let key = (stack_arn.to_string(), secret_ref.to_string());
        if let Some(hit) = self.cached(&key) {
            debug!("Config cache hit");
            return Ok(hit);
        }

        let (parsed, stack) = describe_by_arn(&self.aws, stack_arn).await?;

        let catalog = catalog_from_outputs(&stack).ok_or_else(|| {
            ResolveError::CannotDetermineCatalog {
                stack: parsed.stack_name.clone(),
            }
        })?;

        let database = first_output(&stack.outputs, DATABASE_OUTPUTS).map(str::to_string);
        let queue_url = queue_from_outputs(&stack);
        let bucket = first_output(&stack.outputs, BUCKET_OUTPUTS).map(str::to_string);

        let mut missing = Vec::new();
        if database.is_none() {
            missing.push(format!("database ({})", DATABASE_OUTPUTS.join(" | ")));
        }
        if queue_url.is_none() {
            missing.push(format!("queue ({})", QUEUE_OUTPUTS.join(" | ")));
        }
        if bucket.is_none() {
            missing.push(format!("user bucket ({})", BUCKET_OUTPUTS.join(" | ")));
        }
        if !missing.is_empty() {
            return Err(ResolveError::MissingOutputs {
                stack: parsed.stack_name,
                missing,
            });
        }

        let secret = SecretResolver::new(&self.aws)
            .resolve(secret_ref, &parsed.region)
            .await?;

        let verification = secret
            .enable_webhook_verification
            .as_deref()
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let resolved = Arc::new(ResolvedConfig {
            aws_region: parsed.region.clone(),
            aws_account: parsed.account.clone(),
            quilt_stack_arn: stack_arn.to_string(),
            quilt_catalog: catalog,
            quilt_database: database.unwrap_or_default(),
            quilt_user_bucket: bucket.unwrap_or_default(),
            queue_url: queue_url.unwrap_or_default(),
            benchling_tenant: secret.tenant,
            benchling_client_id: secret.client_id,
            benchling_client_secret: secret.client_secret,
            benchling_app_definition_id: secret.app_definition_id,
            pkg_prefix: secret.pkg_prefix.unwrap_or_else(|| "benchling".to_string()),
            pkg_key: secret.pkg_key.unwrap_or_else(|| "experiment_id".to_string()),
            log_level: secret.log_level.unwrap_or_else(|| "INFO".to_string()),
            enable_webhook_verification: verification,
            webhook_allow_list: secret.webhook_allow_list,
        });

        info!(catalog = %resolved.quilt_catalog, "Resolved runtime configuration");
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        Ok(cache.entry(key).or_insert(resolved).clone())
    }
}
