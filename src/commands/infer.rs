//! `infer`: catalog to stack discovery

use super::Context;
use anyhow::{bail, Context as _, Result};
use benchling_webhook_aws::quilt3::{SOURCE_CLOUDFORMATION, SOURCE_QUILT3};
use benchling_webhook_aws::{Quilt3Cli, StackInference};
use benchling_webhook_config::Layer;
use benchling_webhook_core::DEFAULT_PROFILE;
use clap::Args;
use serde_json::{json, Map, Value};

#[derive(Args)]
pub struct InferArgs {
    /// Catalog URL or domain (default: the one configured for quilt3)
    #[arg(long)]
    pub catalog: Option<String>,

    /// Profile whose derived layer receives the result (with --save)
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Write discovered values into the profile's derived layer
    #[arg(long)]
    pub save: bool,

    /// Print KEY=VALUE lines instead of JSON
    #[arg(long)]
    pub env: bool,
}

pub(super) async fn run(ctx: &Context, args: InferArgs) -> Result<()> {
    let (catalog, source) = match args.catalog {
        Some(catalog) => (catalog, SOURCE_CLOUDFORMATION),
        None => match Quilt3Cli::default().configured_catalog().await {
            Some(catalog) => (catalog, SOURCE_QUILT3),
            None => bail!("No catalog given and quilt3 has none configured; pass --catalog"),
        },
    };

    let resolver = ctx.stack_resolver().await?;
    let inference = resolver
        .infer(&catalog)
        .await
        .with_context(|| format!("Failed to infer configuration for {}", catalog))?;

    if args.save {
        ctx.store
            .write_layer(&args.profile, Layer::Derived, &derived_layer(&inference))
            .with_context(|| format!("Failed to save derived layer for '{}'", args.profile))?;
        eprintln!("Saved derived values to profile '{}'", args.profile);
    }

    if args.env {
        for (key, value) in &inference.inferred {
            println!("{}={}", key, value);
        }
    } else {
        let output = json!({
            "inference": inference.to_inference_result(source),
            "variables": inference.inferred,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

/// Partial profile holding only what discovery found.
fn derived_layer(inference: &StackInference) -> Value {
    let vars = &inference.inferred;
    let pick = |key: &str| vars.get(key).filter(|v| !v.contains("VERIFY THIS")).cloned();

    fn insert(map: &mut Map<String, Value>, key: &str, value: Option<String>) {
        if let Some(value) = value {
            map.insert(key.to_string(), Value::String(value));
        }
    }

    let mut quilt = Map::new();
    insert(&mut quilt, "catalog", pick("QUILT_CATALOG"));
    insert(&mut quilt, "stackArn", pick("QUILT_STACK_ARN"));
    insert(&mut quilt, "database", pick("QUILT_DATABASE"));
    insert(&mut quilt, "queueUrl", pick("QUEUE_URL"));
    insert(&mut quilt, "region", inference.region.clone());

    let mut layer = Map::new();
    layer.insert("quilt".to_string(), Value::Object(quilt));
    if let Some(bucket) = pick("QUILT_USER_BUCKET") {
        layer.insert("packages".to_string(), json!({ "bucket": bucket }));
    }
    if let Some(account) = pick("CDK_DEFAULT_ACCOUNT") {
        layer.insert("deployment".to_string(), json!({ "account": account }));
    }
    Value::Object(layer)
}
