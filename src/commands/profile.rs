//! `profile list | show | delete`

use super::Context;
use crate::output::masked_profile;
use anyhow::{Context as _, Result};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProfileCommand {
    /// List stored profiles
    List,
    /// Print a profile with all layers merged; ARNs and secrets are masked
    Show {
        name: String,
        /// Apply the `_inherits` chain
        #[arg(long)]
        inherit: bool,
    },
    /// Delete a profile and all of its layers
    Delete { name: String },
}

pub(super) fn run(ctx: &Context, command: ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::List => {
            for name in ctx.store.list_profiles().context("Failed to list profiles")? {
                println!("{}", name);
            }
        }
        ProfileCommand::Show { name, inherit } => {
            let profile = if inherit {
                ctx.store.read_profile_with_inheritance(&name)
            } else {
                ctx.store.read_profile(&name)
            }
            .with_context(|| format!("Failed to read profile '{}'", name))?;
            println!("{}", serde_json::to_string_pretty(&masked_profile(&profile)?)?);
        }
        ProfileCommand::Delete { name } => {
            ctx.store
                .delete_profile(&name)
                .with_context(|| format!("Failed to delete profile '{}'", name))?;
            println!("Deleted profile '{}'", name);
        }
    }
    Ok(())
}
