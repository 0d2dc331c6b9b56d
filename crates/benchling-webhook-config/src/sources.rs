// Configuration source loading for the CLI/env/dotenv path.
//
// Source precedence, highest first:
// 1. CLI options
// 2. Process environment (captured once in an EnvSnapshot)
// 3. Dotenv file values
// 4. Built-in defaults
//
// This is the reverse of layer precedence in ProfileStore; see crate::merge.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Overrides the config home directly.
pub const CONFIG_ROOT_ENV: &str = "BENCHLING_WEBHOOK_CONFIG_ROOT";

const CONFIG_DIR_NAME: &str = "benchling-webhook";

/// Read-only view of the process environment.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    fn cwd(&self) -> &Path;

    fn home_dir(&self) -> Option<&Path>;
}

/// Environment captured once at startup and threaded through every call.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
    cwd: PathBuf,
    home: Option<PathBuf>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            home: dirs::home_dir(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            cwd: PathBuf::from("."),
            home: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}

impl EnvSource for EnvSnapshot {
    fn get(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn home_dir(&self) -> Option<&Path> {
        self.home.as_deref()
    }
}

/// `$BENCHLING_WEBHOOK_CONFIG_ROOT`, else `$XDG_CONFIG_HOME/benchling-webhook`,
/// else `~/.config/benchling-webhook`.
pub fn default_config_root<E: EnvSource>(env: &E) -> PathBuf {
    if let Some(root) = env.get(CONFIG_ROOT_ENV) {
        return PathBuf::from(root);
    }
    if let Some(xdg) = env.get("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(CONFIG_DIR_NAME);
    }
    let base = env
        .home_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| env.cwd().to_path_buf());
    base.join(".config").join(CONFIG_DIR_NAME)
}

/// Parse a dotenv file into a map without touching the process environment.
///
/// A missing file yields an empty map unless `required` is set.
pub fn load_dotenv(path: &Path, required: bool) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        if required {
            return Err(ConfigError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "dotenv file not found"),
            ));
        }
        return Ok(BTreeMap::new());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|source| ConfigError::Dotenv {
        path: path.to_path_buf(),
        source,
    })?;

    let mut values = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|source| ConfigError::Dotenv {
            path: path.to_path_buf(),
            source,
        })?;
        values.insert(key, value);
    }
    tracing::debug!(path = %path.display(), count = values.len(), "Loaded dotenv file");
    Ok(values)
}

/// Flat deployment configuration assembled from CLI, env and dotenv.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub cdk_account: Option<String>,
    pub cdk_region: Option<String>,
    pub aws_profile: Option<String>,
    pub quilt_catalog: Option<String>,
    pub quilt_database: Option<String>,
    pub quilt_user_bucket: Option<String>,
    pub quilt_stack_arn: Option<String>,
    pub queue_url: Option<String>,
    pub benchling_tenant: Option<String>,
    pub benchling_client_id: Option<String>,
    pub benchling_client_secret: Option<String>,
    pub benchling_app_definition_id: Option<String>,
    pub benchling_secrets: Option<String>,
    pub pkg_prefix: Option<String>,
    pub pkg_key: Option<String>,
    pub log_level: Option<String>,
    pub webhook_allow_list: Option<String>,
    pub image_tag: Option<String>,
    pub enable_webhook_verification: Option<bool>,
}

/// Field name and the environment variables that populate it, first match wins.
pub const ENV_FIELDS: &[(&str, &[&str])] = &[
    ("cdkAccount", &["CDK_DEFAULT_ACCOUNT", "AWS_ACCOUNT_ID"]),
    ("cdkRegion", &["CDK_DEFAULT_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"]),
    ("awsProfile", &["AWS_PROFILE"]),
    ("quiltCatalog", &["QUILT_CATALOG"]),
    ("quiltDatabase", &["QUILT_DATABASE"]),
    ("quiltUserBucket", &["QUILT_USER_BUCKET"]),
    ("quiltStackArn", &["QUILT_STACK_ARN"]),
    ("queueUrl", &["QUEUE_URL", "SQS_QUEUE_URL"]),
    ("benchlingTenant", &["BENCHLING_TENANT"]),
    ("benchlingClientId", &["BENCHLING_CLIENT_ID"]),
    ("benchlingClientSecret", &["BENCHLING_CLIENT_SECRET"]),
    ("benchlingAppDefinitionId", &["BENCHLING_APP_DEFINITION_ID"]),
    ("benchlingSecrets", &["BENCHLING_SECRETS"]),
    ("pkgPrefix", &["PKG_PREFIX"]),
    ("pkgKey", &["PKG_KEY"]),
    ("logLevel", &["LOG_LEVEL"]),
    ("webhookAllowList", &["WEBHOOK_ALLOW_LIST"]),
    ("imageTag", &["IMAGE_TAG"]),
];

const VERIFICATION_ENV: &str = "ENABLE_WEBHOOK_VERIFICATION";

impl DeployConfig {
    fn field_mut(&mut self, field: &str) -> Option<&mut Option<String>> {
        let slot = match field {
            "cdkAccount" => &mut self.cdk_account,
            "cdkRegion" => &mut self.cdk_region,
            "awsProfile" => &mut self.aws_profile,
            "quiltCatalog" => &mut self.quilt_catalog,
            "quiltDatabase" => &mut self.quilt_database,
            "quiltUserBucket" => &mut self.quilt_user_bucket,
            "quiltStackArn" => &mut self.quilt_stack_arn,
            "queueUrl" => &mut self.queue_url,
            "benchlingTenant" => &mut self.benchling_tenant,
            "benchlingClientId" => &mut self.benchling_client_id,
            "benchlingClientSecret" => &mut self.benchling_client_secret,
            "benchlingAppDefinitionId" => &mut self.benchling_app_definition_id,
            "benchlingSecrets" => &mut self.benchling_secrets,
            "pkgPrefix" => &mut self.pkg_prefix,
            "pkgKey" => &mut self.pkg_key,
            "logLevel" => &mut self.log_level,
            "webhookAllowList" => &mut self.webhook_allow_list,
            "imageTag" => &mut self.image_tag,
            _ => return None,
        };
        Some(slot)
    }

    /// Fill every unset field from `other`.
    fn fill_from(&mut self, mut other: DeployConfig) {
        for (field, _) in ENV_FIELDS {
            let value = other.field_mut(field).and_then(Option::take);
            if let Some(slot) = self.field_mut(field) {
                if slot.is_none() {
                    *slot = value;
                }
            }
        }
        if self.enable_webhook_verification.is_none() {
            self.enable_webhook_verification = other.enable_webhook_verification;
        }
    }

    /// Build from a key lookup using the env-variable names in [`ENV_FIELDS`].
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = DeployConfig::default();
        for (field, names) in ENV_FIELDS {
            let value = names.iter().find_map(|name| lookup(name));
            if let Some(slot) = config.field_mut(field) {
                *slot = value;
            }
        }
        if let Some(raw) = lookup(VERIFICATION_ENV) {
            config.enable_webhook_verification = Some(parse_bool(VERIFICATION_ENV, &raw)?);
        }
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        self.pkg_prefix
            .get_or_insert_with(crate::types::default_pkg_prefix);
        self.pkg_key.get_or_insert_with(crate::types::default_pkg_key);
        self.log_level.get_or_insert_with(|| "INFO".to_string());
        self.enable_webhook_verification.get_or_insert(true);
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            errors: vec![format!("{} must be true or false, got '{}'", name, other)],
        }),
    }
}

/// Combine CLI options, environment and dotenv values, then apply defaults.
pub fn load_config<E: EnvSource>(
    cli: &DeployConfig,
    env: &E,
    dotenv: &BTreeMap<String, String>,
) -> Result<DeployConfig> {
    let mut config = cli.clone();

    let from_env = DeployConfig::from_lookup(|key| env.get(key))?;
    config.fill_from(from_env);

    let from_dotenv = DeployConfig::from_lookup(|key| {
        dotenv
            .get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    })?;
    config.fill_from(from_dotenv);

    config.apply_defaults();
    Ok(config)
}

/// Fill only the fields `loaded` left unset; `inferred` is keyed by env name.
pub fn merge_inferred_config(
    loaded: &DeployConfig,
    inferred: &BTreeMap<String, String>,
) -> DeployConfig {
    let mut merged = loaded.clone();
    for (field, names) in ENV_FIELDS {
        let Some(slot) = merged.field_mut(field) else {
            continue;
        };
        if slot.is_some() {
            continue;
        }
        if let Some(value) = names.iter().find_map(|name| inferred.get(*name)) {
            *slot = Some(value.clone());
        }
    }
    merged
}
