//! Profile-to-Secrets-Manager reconciliation
//!
//! The desired payload is overlaid onto the live one, so fields only the
//! remote secret knows about survive, and a placeholder `clientSecret` in the
//! profile never replaces a real remote value.
//!
//! Writes are check-then-act with no version token: two synchronizers racing
//! on one secret both write, and the last write wins.

use crate::error::{ResolveError, Result};
use crate::provider::{AwsProvider, SecretValue};
use crate::secret::parse_secret_payload;
use benchling_webhook_config::{deep_merge, Layer, Profile, ProfileStore};
use benchling_webhook_core::arn::{arn_region, is_secret_arn};
use benchling_webhook_core::{is_placeholder_secret, mask_arn, secret_name};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{info, instrument, warn};

const SECRET_DESCRIPTION: &str = "Benchling webhook credentials managed by benchling-webhook";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Created,
    Updated,
    Skipped,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub profile: String,
    pub secret_name: String,
    pub secret_arn: String,
    pub action: SyncAction,
}

#[derive(Debug)]
pub struct SyncFailure {
    pub profile: String,
    pub error: ResolveError,
}

/// Outcome of a batch; one entry per profile in either list.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub records: Vec<SyncRecord>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fields of the secret the profile is authoritative for.
fn desired_overlay(profile: &Profile, keep_remote_secret: bool) -> Value {
    let mut overlay = Map::new();
    let benchling = &profile.benchling;
    overlay.insert("client_id".into(), json!(benchling.client_id));
    overlay.insert("tenant".into(), json!(benchling.tenant));
    if !keep_remote_secret {
        if let Some(secret) = &benchling.client_secret {
            overlay.insert("client_secret".into(), json!(secret.trim()));
        }
    }
    if let Some(app) = benchling.app_definition_id.as_deref().filter(|s| !s.is_empty()) {
        overlay.insert("app_definition_id".into(), json!(app));
    }

    let packages = &profile.packages;
    if !packages.bucket.is_empty() {
        overlay.insert("user_bucket".into(), json!(packages.bucket));
    }
    overlay.insert("pkg_prefix".into(), json!(packages.prefix));
    overlay.insert("pkg_key".into(), json!(packages.metadata_key));

    if let Some(level) = profile.logging.as_ref().and_then(|l| l.level.as_deref()) {
        overlay.insert("log_level".into(), json!(level));
    }
    if let Some(allow) = profile
        .security
        .as_ref()
        .and_then(|s| s.webhook_allow_list.as_deref())
    {
        overlay.insert("webhook_allow_list".into(), json!(allow));
    }
    overlay.insert(
        "enable_webhook_verification".into(),
        json!(profile.verification_enabled().to_string()),
    );
    Value::Object(overlay)
}

/// Existing secret as a JSON object; anything unparseable counts as empty.
fn existing_object(secret: &str, value: &SecretValue) -> Value {
    let parsed = match value {
        SecretValue::String(text) => serde_json::from_str::<Value>(text).ok(),
        SecretValue::Binary(_) => None,
    };
    match parsed {
        Some(v) if v.is_object() => v,
        _ => {
            warn!(secret = %mask_arn(secret), "Existing secret is not a JSON object; rebuilding it");
            Value::Object(Map::new())
        }
    }
}

/// Serialize and structurally check the merged payload before any write.
fn checked_payload(secret: &str, merged: &Value) -> Result<String> {
    let text = merged.to_string();
    parse_secret_payload(secret, &SecretValue::String(text.clone()))?;
    Ok(text)
}

pub struct SecretsSynchronizer<P: AwsProvider> {
    aws: P,
}

impl<P: AwsProvider> SecretsSynchronizer<P> {
    pub fn new(aws: P) -> Self {
        Self { aws }
    }

    /// Synchronize one profile's secret and record its ARN in the profile.
    #[instrument(skip(self, store))]
    pub async fn sync_profile(
        &self,
        store: &ProfileStore,
        profile_name: &str,
        force: bool,
    ) -> Result<SyncRecord> {
        let profile = store.read_profile(profile_name)?;
        let name = secret_name(profile_name, &profile.benchling.tenant);
        let existing_arn = profile
            .benchling
            .secret_arn
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let secret_ref = existing_arn.unwrap_or(&name).to_string();

        let region = match existing_arn.and_then(arn_region) {
            Some(region) => region.to_string(),
            None => profile.deployment.region.clone(),
        };

        let keep_remote_secret = is_placeholder_secret(
            profile.benchling.client_secret.as_deref(),
            &name,
            existing_arn,
        );
        let overlay = desired_overlay(&profile, keep_remote_secret);

        let (arn, action) = match self.aws.describe_secret(&region, &secret_ref).await {
            Ok(metadata) => {
                let current = self
                    .aws
                    .get_secret_value(&region, &metadata.arn)
                    .await
                    .map_err(|e| ResolveError::from_secret_call(&metadata.arn, e))?;
                let existing = existing_object(&metadata.arn, &current);
                let mut merged = existing.clone();
                deep_merge(&mut merged, &overlay);

                if merged == existing && !force {
                    info!(secret = %mask_arn(&metadata.arn), "Secret already up to date");
                    (metadata.arn, SyncAction::Skipped)
                } else {
                    let body = checked_payload(&metadata.arn, &merged)?;
                    self.aws
                        .update_secret(&region, &metadata.arn, &body)
                        .await
                        .map_err(|e| ResolveError::from_secret_call(&metadata.arn, e))?;
                    info!(secret = %mask_arn(&metadata.arn), "Updated secret");
                    (metadata.arn, SyncAction::Updated)
                }
            }
            // A recorded ARN that no longer resolves is not recreated under a new name.
            Err(e) if e.is_not_found() && !is_secret_arn(&secret_ref) => {
                let body = checked_payload(&name, &overlay)?;
                let created = self
                    .aws
                    .create_secret(&region, &name, &body, SECRET_DESCRIPTION)
                    .await
                    .map_err(|e| ResolveError::from_secret_call(&name, e))?;
                info!(secret = %mask_arn(&created.arn), "Created secret");
                (created.arn, SyncAction::Created)
            }
            Err(e) => return Err(ResolveError::from_secret_call(&secret_ref, e)),
        };

        if existing_arn != Some(arn.as_str()) {
            record_secret_arn(store, profile_name, &arn)?;
        }

        Ok(SyncRecord {
            profile: profile_name.to_string(),
            secret_name: name,
            secret_arn: arn,
            action,
        })
    }

    /// Synchronize each profile in turn, collecting failures instead of stopping.
    pub async fn sync_all(
        &self,
        store: &ProfileStore,
        profiles: &[String],
        force: bool,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for profile in profiles {
            match self.sync_profile(store, profile, force).await {
                Ok(record) => report.records.push(record),
                Err(error) => {
                    warn!(profile = %profile, error = %error, "Secret sync failed");
                    report.failures.push(SyncFailure {
                        profile: profile.clone(),
                        error,
                    });
                }
            }
        }
        report
    }
}

/// Write `benchling.secretArn` into the user layer only.
fn record_secret_arn(store: &ProfileStore, profile: &str, arn: &str) -> Result<()> {
    let Some(mut user) = store.read_layer(profile, Layer::User)? else {
        return Ok(());
    };
    if let Some(benchling) = user.get_mut("benchling").and_then(Value::as_object_mut) {
        benchling.insert("secretArn".to_string(), json!(arn));
    }
    store.write_layer(profile, Layer::User, &user)?;
    Ok(())
}
