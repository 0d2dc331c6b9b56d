//! `resolve`: runtime configuration for a deployed stack

use super::Context;
use anyhow::{Context as _, Result};
use benchling_webhook_aws::ConfigResolver;
use benchling_webhook_core::mask_arn;
use clap::Args;

#[derive(Args)]
pub struct ResolveArgs {
    /// CloudFormation ARN of the Quilt stack
    #[arg(long, env = "QUILT_STACK_ARN")]
    pub stack_arn: String,

    /// Secret name or ARN holding the Benchling credentials
    #[arg(long, env = "BENCHLING_SECRET")]
    pub secret: String,
}

pub(super) async fn run(ctx: &Context, args: ResolveArgs) -> Result<()> {
    let resolver = ConfigResolver::new(ctx.aws().await);
    let config = resolver
        .resolve(&args.stack_arn, &args.secret)
        .await
        .with_context(|| {
            format!(
                "Failed to resolve configuration from {} and secret {}",
                args.stack_arn,
                mask_arn(&args.secret)
            )
        })?;

    // The client secret is never serialized.
    println!("{}", serde_json::to_string_pretty(&*config)?);
    Ok(())
}
