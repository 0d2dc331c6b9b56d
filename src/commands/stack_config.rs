//! `stack-config`: deployment parameters for the infrastructure layer

use super::Context;
use anyhow::{Context as _, Result};
use benchling_webhook_config::profile_to_stack_config;
use benchling_webhook_core::DEFAULT_PROFILE;
use clap::Args;

#[derive(Args)]
pub struct StackConfigArgs {
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,
}

pub(super) fn run(ctx: &Context, args: StackConfigArgs) -> Result<()> {
    let profile = ctx
        .store
        .read_profile_with_inheritance(&args.profile)
        .with_context(|| format!("Failed to read profile '{}'", args.profile))?;
    let output = profile_to_stack_config(&profile)
        .with_context(|| format!("Profile '{}' is not deployment-ready", args.profile))?;

    for warning in &output.warnings {
        eprintln!("warning: {}", warning);
    }
    println!("{}", serde_json::to_string_pretty(&output.config)?);
    Ok(())
}
