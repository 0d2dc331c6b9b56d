//! `init`: interactive profile setup
//!
//! Discovery runs first so its results become prompt defaults. Answers are
//! projected into a profile by `profile_from_answers`; this module only asks.

use super::Context;
use anyhow::{Context as _, Result};
use benchling_webhook_aws::quilt3::SOURCE_CLOUDFORMATION;
use benchling_webhook_aws::{Quilt3Cli, StackInference};
use benchling_webhook_config::wizard::keys;
use benchling_webhook_config::{profile_from_answers, Profile};
use benchling_webhook_core::DEFAULT_PROFILE;
use clap::Args;
use dialoguer::{Confirm, Input, Password};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Args)]
pub struct InitArgs {
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Catalog URL (default: the existing profile's, then quilt3's)
    #[arg(long)]
    pub catalog: Option<String>,

    /// Skip Quilt stack discovery
    #[arg(long)]
    pub no_infer: bool,

    /// Update an existing profile without asking
    #[arg(long)]
    pub force: bool,
}

fn ask(prompt: &str, default: Option<String>, required: bool) -> Result<String> {
    let mut input = Input::<String>::new()
        .with_prompt(prompt)
        .allow_empty(!required);
    if let Some(default) = default.filter(|d| !d.trim().is_empty()) {
        input = input.default(default);
    }
    Ok(input.interact_text()?)
}

fn non_empty(value: &str) -> Option<String> {
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

pub(super) async fn run(ctx: &Context, args: InitArgs) -> Result<()> {
    println!();
    println!("benchling-webhook init - profile '{}'", args.profile);
    println!();

    let existing = if ctx.store.profile_exists(&args.profile) {
        if !args.force {
            let update = Confirm::new()
                .with_prompt(format!("Profile '{}' exists. Update it?", args.profile))
                .default(true)
                .interact()?;
            if !update {
                println!("Aborted.");
                return Ok(());
            }
        }
        Some(
            ctx.store
                .read_profile(&args.profile)
                .with_context(|| format!("Failed to read profile '{}'", args.profile))?,
        )
    } else {
        None
    };

    let mut default_catalog = args
        .catalog
        .clone()
        .or_else(|| existing.as_ref().and_then(|p| non_empty(&p.quilt.catalog)));
    if default_catalog.is_none() {
        default_catalog = Quilt3Cli::default().configured_catalog().await;
    }
    let catalog = ask("Quilt catalog URL", default_catalog, true)?;

    let inference = if args.no_infer {
        None
    } else {
        match ctx.stack_resolver().await?.infer(&catalog).await {
            Ok(inference) => {
                if let Some(stack) = &inference.stack_name {
                    println!("Found Quilt stack {}", stack);
                }
                Some(inference)
            }
            Err(e) => {
                warn!(error = %e, "Stack discovery failed");
                eprintln!("Could not discover the Quilt stack: {:#}", e);
                None
            }
        }
    };

    let answers = prompt_answers(ctx, &catalog, existing.as_ref(), inference.as_ref())?;
    let result = inference
        .as_ref()
        .map(|i| i.to_inference_result(SOURCE_CLOUDFORMATION));
    let mut profile = profile_from_answers(&answers, result.as_ref())?;
    if let Some(existing) = existing {
        carry_over(existing, &mut profile);
    }

    let slots = ctx
        .store
        .write_profile(&args.profile, &profile)
        .with_context(|| format!("Failed to save profile '{}'", args.profile))?;

    println!();
    println!("Saved {}", slots.live.display());
    if let Some(previous) = slots.previous {
        println!("Previous version kept at {}", previous.display());
    }
    println!("Next: benchling-webhook sync-secrets --profile {}", args.profile);
    Ok(())
}

fn prompt_answers(
    ctx: &Context,
    catalog: &str,
    existing: Option<&Profile>,
    inference: Option<&StackInference>,
) -> Result<BTreeMap<String, String>> {
    let inferred = |key: &str| {
        inference
            .and_then(|i| i.inferred.get(key))
            .filter(|v| !v.contains("VERIFY THIS"))
            .cloned()
    };
    let from_existing = |f: fn(&Profile) -> Option<String>| existing.and_then(f);

    let mut answers = BTreeMap::new();
    answers.insert(keys::CATALOG.to_string(), catalog.to_string());

    let tenant = ask(
        "Benchling tenant",
        from_existing(|p| non_empty(&p.benchling.tenant)),
        true,
    )?;
    answers.insert(keys::TENANT.to_string(), tenant);

    let client_id = ask(
        "Benchling OAuth client ID",
        from_existing(|p| non_empty(&p.benchling.client_id)),
        true,
    )?;
    answers.insert(keys::CLIENT_ID.to_string(), client_id);

    let secret_prompt = if existing.is_some() {
        "Benchling OAuth client secret (blank keeps the current one)"
    } else {
        "Benchling OAuth client secret"
    };
    let client_secret = Password::new()
        .with_prompt(secret_prompt)
        .allow_empty_password(true)
        .interact()?;
    answers.insert(keys::CLIENT_SECRET.to_string(), client_secret);

    let app_definition = ask(
        "Benchling app definition ID (blank if verification is off)",
        from_existing(|p| p.benchling.app_definition_id.clone()),
        false,
    )?;
    answers.insert(keys::APP_DEFINITION_ID.to_string(), app_definition);

    let region = ask(
        "AWS region for the webhook",
        inferred("CDK_DEFAULT_REGION")
            .or_else(|| from_existing(|p| non_empty(&p.deployment.region)))
            .or_else(|| ctx.region()),
        true,
    )?;
    answers.insert(keys::REGION.to_string(), region);

    let fields: [(&str, &str, Option<String>); 4] = [
        (
            keys::ACCOUNT,
            "AWS account ID",
            inferred("CDK_DEFAULT_ACCOUNT").or_else(|| from_existing(|p| p.deployment.account.clone())),
        ),
        (
            keys::DATABASE,
            "Quilt Athena database",
            inferred("QUILT_DATABASE").or_else(|| from_existing(|p| non_empty(&p.quilt.database))),
        ),
        (
            keys::QUEUE_URL,
            "Packager queue URL",
            inferred("QUEUE_URL").or_else(|| from_existing(|p| non_empty(&p.quilt.queue_url))),
        ),
        (
            keys::BUCKET,
            "Package bucket",
            inferred("QUILT_USER_BUCKET").or_else(|| from_existing(|p| non_empty(&p.packages.bucket))),
        ),
    ];
    for (key, prompt, default) in fields {
        answers.insert(key.to_string(), ask(prompt, default, false)?);
    }
    Ok(answers)
}

/// Keep what the wizard does not ask about from the profile being replaced.
fn carry_over(existing: Profile, profile: &mut Profile) {
    if profile.benchling.client_secret.is_none() {
        profile.benchling.client_secret = existing.benchling.client_secret;
    }
    profile.benchling.secret_arn = existing.benchling.secret_arn;
    if profile.quilt.stack_arn.is_none() {
        profile.quilt.stack_arn = existing.quilt.stack_arn;
    }
    profile.quilt.write_role_arn = existing.quilt.write_role_arn;
    profile.quilt.read_role_arn = existing.quilt.read_role_arn;
    profile.quilt.bucket_write_policy_arn = existing.quilt.bucket_write_policy_arn;
    profile.quilt.athena_user_policy_arn = existing.quilt.athena_user_policy_arn;

    profile.deployment.vpc = existing.deployment.vpc;
    profile.deployment.stack_name = existing.deployment.stack_name;
    profile.deployment.image_tag = existing.deployment.image_tag;
    if profile.security.is_none() {
        profile.security = existing.security;
    }
    if profile.logging.is_none() {
        profile.logging = existing.logging;
    }

    profile.metadata.created_at = existing.metadata.created_at;
    profile.inherits = existing.inherits;
    profile.extensions = existing.extensions;
}
