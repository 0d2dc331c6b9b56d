//! `validate`: deployment-readiness of CLI, environment and dotenv input

use super::Context;
use crate::output::render_validation;
use anyhow::{Context as _, Result};
use benchling_webhook_config::{
    load_config, load_dotenv, merge_inferred_config, process_benchling_secrets_input,
    validate_config, BenchlingSecretsInput, ConfigError, DeployConfig, EnvSource,
};
use clap::Args;
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Default)]
pub struct ValidateArgs {
    /// Dotenv file to read (default: .env in the working directory, if present)
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Fill unset fields from the catalog's Quilt stack
    #[arg(long)]
    pub infer: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    #[arg(long)]
    pub catalog: Option<String>,
    #[arg(long)]
    pub tenant: Option<String>,
    #[arg(long)]
    pub client_id: Option<String>,
    #[arg(long)]
    pub client_secret: Option<String>,
    #[arg(long)]
    pub app_definition_id: Option<String>,
    /// Secret ARN, inline JSON, or @file with either
    #[arg(long)]
    pub benchling_secrets: Option<String>,
    #[arg(long)]
    pub account: Option<String>,
    #[arg(long = "deploy-region")]
    pub deploy_region: Option<String>,
    #[arg(long)]
    pub database: Option<String>,
    #[arg(long)]
    pub queue_url: Option<String>,
    #[arg(long)]
    pub user_bucket: Option<String>,
    #[arg(long)]
    pub stack_arn: Option<String>,
    #[arg(long)]
    pub pkg_prefix: Option<String>,
    #[arg(long)]
    pub pkg_key: Option<String>,
    #[arg(long)]
    pub webhook_allow_list: Option<String>,
    /// Disable webhook signature verification
    #[arg(long)]
    pub no_verification: bool,
}

impl ValidateArgs {
    fn to_cli_config(&self) -> DeployConfig {
        DeployConfig {
            cdk_account: self.account.clone(),
            cdk_region: self.deploy_region.clone(),
            quilt_catalog: self.catalog.clone(),
            quilt_database: self.database.clone(),
            quilt_user_bucket: self.user_bucket.clone(),
            quilt_stack_arn: self.stack_arn.clone(),
            queue_url: self.queue_url.clone(),
            benchling_tenant: self.tenant.clone(),
            benchling_client_id: self.client_id.clone(),
            benchling_client_secret: self.client_secret.clone(),
            benchling_app_definition_id: self.app_definition_id.clone(),
            benchling_secrets: self.benchling_secrets.clone(),
            pkg_prefix: self.pkg_prefix.clone(),
            pkg_key: self.pkg_key.clone(),
            webhook_allow_list: self.webhook_allow_list.clone(),
            enable_webhook_verification: self.no_verification.then_some(false),
            ..Default::default()
        }
    }
}

/// Load every source in precedence order, without inference.
pub(super) fn load<E: EnvSource>(env: &E, args: &ValidateArgs) -> Result<DeployConfig> {
    let (path, required) = match &args.env_file {
        Some(path) => (env.cwd().join(path), true),
        None => (env.cwd().join(".env"), false),
    };
    let dotenv = load_dotenv(&path, required)?;
    let mut config = load_config(&args.to_cli_config(), env, &dotenv)?;

    if let Some(input) = config.benchling_secrets.clone() {
        if let BenchlingSecretsInput::Json(payload) =
            process_benchling_secrets_input(&input, env.cwd())?
        {
            // Inline credentials only fill what no other source set.
            config.benchling_tenant.get_or_insert(payload.tenant);
            config.benchling_client_id.get_or_insert(payload.client_id);
            config
                .benchling_client_secret
                .get_or_insert(payload.client_secret);
            if let Some(app) = payload.app_definition_id {
                config.benchling_app_definition_id.get_or_insert(app);
            }
        }
    }
    Ok(config)
}

pub(super) async fn run(ctx: &Context, args: ValidateArgs) -> Result<()> {
    let mut config = load(&ctx.env, &args).context("Failed to load configuration")?;

    if args.infer {
        match config.quilt_catalog.clone() {
            Some(catalog) => match ctx.stack_resolver().await?.infer(&catalog).await {
                Ok(inference) => config = merge_inferred_config(&config, &inference.inferred),
                Err(e) => warn!(catalog = %catalog, error = %e, "Inference failed; validating as loaded"),
            },
            None => warn!("--infer needs a catalog; skipping inference"),
        }
    }

    let result = validate_config(&config);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_validation(&result));
    }

    if !result.valid {
        return Err(ConfigError::Invalid {
            errors: result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchling_webhook_config::EnvSnapshot;
    use std::fs;

    #[test]
    fn test_cli_beats_env_beats_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "QUILT_CATALOG=dotenv.example.com\nBENCHLING_TENANT=dotenv\nQUILT_DATABASE=dotenv_db\n",
        )
        .unwrap();
        let env = EnvSnapshot::from_pairs([("BENCHLING_TENANT", "env")]).with_cwd(dir.path());
        let args = ValidateArgs {
            catalog: Some("cli.example.com".to_string()),
            ..Default::default()
        };

        let config = load(&env, &args).unwrap();
        assert_eq!(config.quilt_catalog.as_deref(), Some("cli.example.com"));
        assert_eq!(config.benchling_tenant.as_deref(), Some("env"));
        assert_eq!(config.quilt_database.as_deref(), Some("dotenv_db"));
        assert_eq!(config.pkg_prefix.as_deref(), Some("benchling"));
    }

    #[test]
    fn test_explicit_env_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSnapshot::from_pairs(Vec::<(String, String)>::new()).with_cwd(dir.path());
        let args = ValidateArgs {
            env_file: Some(PathBuf::from("missing.env")),
            ..Default::default()
        };
        assert!(load(&env, &args).is_err());
        assert!(load(&env, &ValidateArgs::default()).is_ok());
    }

    #[test]
    fn test_inline_secrets_fill_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvSnapshot::from_pairs(Vec::<(String, String)>::new()).with_cwd(dir.path());
        let args = ValidateArgs {
            tenant: Some("cli-tenant".to_string()),
            benchling_secrets: Some(
                r#"{"client_id":"id","client_secret":"shh","tenant":"acme"}"#.to_string(),
            ),
            ..Default::default()
        };

        let config = load(&env, &args).unwrap();
        assert_eq!(config.benchling_tenant.as_deref(), Some("cli-tenant"));
        assert_eq!(config.benchling_client_id.as_deref(), Some("id"));
        assert_eq!(config.benchling_client_secret.as_deref(), Some("shh"));
    }
}
