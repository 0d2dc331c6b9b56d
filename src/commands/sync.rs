//! `sync-secrets`: push profile credentials to Secrets Manager

use super::Context;
use crate::output::render_sync_report;
use anyhow::{bail, Context as _, Result};
use benchling_webhook_aws::SecretsSynchronizer;
use benchling_webhook_core::DEFAULT_PROFILE;
use clap::Args;

#[derive(Args)]
pub struct SyncArgs {
    /// Profile to synchronize
    #[arg(long, default_value = DEFAULT_PROFILE, conflicts_with = "all")]
    pub profile: String,

    /// Synchronize every stored profile
    #[arg(long)]
    pub all: bool,

    /// Write the secret even when it already matches
    #[arg(long)]
    pub force: bool,
}

pub(super) async fn run(ctx: &Context, args: SyncArgs) -> Result<()> {
    let profiles = if args.all {
        ctx.store
            .list_profiles()
            .context("Failed to list profiles")?
    } else {
        vec![args.profile]
    };
    if profiles.is_empty() {
        bail!("No profiles found in {}", ctx.store.root().display());
    }

    let synchronizer = SecretsSynchronizer::new(ctx.aws().await);
    let report = synchronizer
        .sync_all(&ctx.store, &profiles, args.force)
        .await;
    print!("{}", render_sync_report(&report));

    if !report.is_success() {
        bail!(
            "{} of {} profile(s) failed to sync",
            report.failures.len(),
            profiles.len()
        );
    }
    Ok(())
}
