//! Profile, layer and StackConfig definitions
//!
//! JSON documents use camelCase keys. Fields serialize in declaration order so
//! repeated writes of the same profile are byte-identical.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Current profile document version
pub const PROFILE_VERSION: &str = "0.7.0";

/// Named, persisted configuration for one deployment of the integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub benchling: BenchlingConfig,
    pub quilt: QuiltConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
    pub deployment: DeploymentConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    #[serde(rename = "_metadata")]
    pub metadata: ProfileMetadata,
    /// Parent profile whose values this one extends
    #[serde(rename = "_inherits", default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,
    /// Undeclared top-level keys, preserved across read/write
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchlingConfig {
    pub tenant: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_definition_id: Option<String>,
}

impl std::fmt::Debug for BenchlingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchlingConfig")
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .field("has_client_secret", &self.client_secret.is_some())
            .field("secret_arn", &self.secret_arn)
            .field("app_definition_id", &self.app_definition_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuiltConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_arn: Option<String>,
    #[serde(default)]
    pub catalog: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub queue_url: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_write_policy_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub athena_user_policy_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagesConfig {
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_pkg_prefix")]
    pub prefix: String,
    #[serde(default = "default_pkg_key")]
    pub metadata_key: String,
}

pub fn default_pkg_prefix() -> String {
    "benchling".to_string()
}

pub fn default_pkg_key() -> String {
    "experiment_id".to_string()
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: default_pkg_prefix(),
            metadata_key: default_pkg_key(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<VpcConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_name: Option<String>,
}

/// Existing-VPC placement. Without `vpcId` the stack creates its own VPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private_subnet_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_subnet_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_cidr_block: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_verification: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_allow_list: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    pub version: String,
    pub created_at: String,
    pub updated_at: String,
    pub source: String,
}

impl ProfileMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        let now = timestamp();
        Self {
            version: PROFILE_VERSION.to_string(),
            created_at: now.clone(),
            updated_at: now,
            source: source.into(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = timestamp();
    }
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Profile {
    /// Strip ingest-time noise (URL scheme on the catalog, whitespace).
    pub fn normalize(&mut self) {
        self.quilt.catalog = normalize_catalog(&self.quilt.catalog);
        self.benchling.tenant = self.benchling.tenant.trim().to_string();
    }

    /// Deployment-ready: secret ARN plus every required Quilt field present.
    pub fn is_deployment_ready(&self) -> bool {
        let present = |s: &str| !s.trim().is_empty();
        self.benchling.secret_arn.as_deref().is_some_and(present)
            && present(&self.quilt.catalog)
            && present(&self.quilt.database)
            && present(&self.quilt.queue_url)
            && present(&self.quilt.region)
    }

    pub fn verification_enabled(&self) -> bool {
        self.security
            .as_ref()
            .and_then(|s| s.enable_verification)
            .unwrap_or(true)
    }
}

/// Reduce a catalog URL to its bare host: no scheme, no path, no trailing slash.
pub fn normalize_catalog(catalog: &str) -> String {
    let trimmed = catalog.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Provenance-tagged partial view of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Operator-entered values
    User,
    /// Machine-inferred values
    Derived,
    /// Post-deployment outputs
    Deploy,
}

impl Layer {
    /// Lowest to highest precedence
    pub const ALL: [Layer; 3] = [Layer::User, Layer::Derived, Layer::Deploy];

    /// Subdirectory of the profile directory holding this layer, if any
    pub fn subdir(&self) -> Option<&'static str> {
        match self {
            Layer::User => None,
            Layer::Derived => Some("derived"),
            Layer::Deploy => Some("deploy"),
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::User => write!(f, "user"),
            Layer::Derived => write!(f, "derived"),
            Layer::Deploy => write!(f, "deploy"),
        }
    }
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Layer::User),
            "derived" => Ok(Layer::Derived),
            "deploy" => Ok(Layer::Deploy),
            _ => Err(format!(
                "Unsupported layer: {}. Supported: user, derived, deploy",
                s
            )),
        }
    }
}

/// Infrastructure-facing projection of a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    pub benchling: StackBenchlingConfig,
    pub quilt: QuiltConfig,
    pub deployment: DeploymentConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackBenchlingConfig {
    pub secret_arn: String,
}

/// One deployment of a profile to a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub endpoint: String,
    pub image_tag: String,
    pub stack_name: String,
    pub region: String,
    pub deployed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
}

/// `deployments.json`: the active record per stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployments {
    #[serde(default)]
    pub active: BTreeMap<String, DeploymentRecord>,
}

/// Output of catalog/stack discovery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub catalog_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quilt_stack_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quilt_user_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quilt_region: Option<String>,
    pub source: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_profile() -> Profile {
        Profile {
            benchling: BenchlingConfig {
                tenant: "acme".to_string(),
                client_id: "client-123".to_string(),
                client_secret: Some("shh".to_string()),
                secret_arn: Some(
                    "arn:aws:secretsmanager:us-east-1:123456789012:secret:bw-AbCdEf".to_string(),
                ),
                app_definition_id: Some("appdef_1".to_string()),
            },
            quilt: QuiltConfig {
                stack_arn: Some(
                    "arn:aws:cloudformation:us-east-1:123456789012:stack/Quilt/abc".to_string(),
                ),
                catalog: "quilt.example.com".to_string(),
                database: "quilt_db".to_string(),
                queue_url: "https://sqs.us-east-1.amazonaws.com/123456789012/packager".to_string(),
                region: "us-east-1".to_string(),
                ..Default::default()
            },
            packages: PackagesConfig {
                bucket: "acme-packages".to_string(),
                ..Default::default()
            },
            deployment: DeploymentConfig {
                region: "us-east-1".to_string(),
                ..Default::default()
            },
            security: None,
            logging: None,
            metadata: ProfileMetadata::new("test"),
            inherits: None,
            extensions: BTreeMap::new(),
        }
    }

    #[test]
    fn test_normalize_catalog() {
        assert_eq!(normalize_catalog("https://quilt.example.com/"), "quilt.example.com");
        assert_eq!(normalize_catalog("http://quilt.example.com/b/x"), "quilt.example.com");
        assert_eq!(normalize_catalog(" quilt.example.com "), "quilt.example.com");
    }

    #[test]
    fn test_deployment_ready() {
        let mut profile = sample_profile();
        assert!(profile.is_deployment_ready());
        profile.benchling.secret_arn = None;
        assert!(!profile.is_deployment_ready());
    }

    #[test]
    fn test_unknown_top_level_keys_round_trip() {
        let mut value = serde_json::to_value(sample_profile()).unwrap();
        value["futureSection"] = serde_json::json!({"enabled": true});
        let profile: Profile = serde_json::from_value(value).unwrap();
        assert!(profile.extensions.contains_key("futureSection"));
        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["futureSection"]["enabled"], true);
    }

    #[test]
    fn test_packages_defaults() {
        let packages: PackagesConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(packages.prefix, "benchling");
        assert_eq!(packages.metadata_key, "experiment_id");
    }

    #[test]
    fn test_layer_from_str() {
        assert_eq!("Deploy".parse::<Layer>().unwrap(), Layer::Deploy);
        assert!("system".parse::<Layer>().is_err());
    }
}
