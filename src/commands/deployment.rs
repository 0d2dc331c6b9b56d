//! `record-deployment`: remember what was deployed for a stage

use super::Context;
use anyhow::{Context as _, Result};
use benchling_webhook_config::{DeploymentRecord, EnvSource};
use benchling_webhook_core::DEFAULT_PROFILE;
use chrono::{SecondsFormat, Utc};
use clap::Args;

#[derive(Args)]
pub struct RecordDeploymentArgs {
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Stage name, e.g. dev or prod
    #[arg(long)]
    pub stage: String,

    /// Webhook endpoint URL of the deployed stack
    #[arg(long)]
    pub endpoint: String,

    #[arg(long, default_value = "latest")]
    pub image_tag: String,

    /// Deployed stack name (default: the profile's deployment.stackName)
    #[arg(long)]
    pub stack_name: Option<String>,
}

pub(super) fn run(ctx: &Context, args: RecordDeploymentArgs) -> Result<()> {
    let profile = ctx
        .store
        .read_profile(&args.profile)
        .with_context(|| format!("Failed to read profile '{}'", args.profile))?;

    let record = DeploymentRecord {
        endpoint: args.endpoint,
        image_tag: args.image_tag,
        stack_name: args
            .stack_name
            .or(profile.deployment.stack_name)
            .unwrap_or_else(|| "BenchlingWebhookStack".to_string()),
        region: profile.deployment.region,
        deployed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        deployed_by: ctx.env.get("USER").or_else(|| ctx.env.get("USERNAME")),
    };
    ctx.store
        .record_deployment(&args.profile, &args.stage, record)
        .with_context(|| format!("Failed to record deployment for '{}'", args.profile))?;

    println!("Recorded {} deployment for profile '{}'", args.stage, args.profile);
    Ok(())
}
