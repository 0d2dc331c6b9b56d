//! Projection of wizard answers into a Profile
//!
//! Prompt rendering lives in the binary; this module only sees the answers as
//! a `field -> value` map. Answers win over inferred values.

use crate::error::{ConfigError, Result};
use crate::types::{
    default_pkg_key, default_pkg_prefix, normalize_catalog, BenchlingConfig, DeploymentConfig,
    InferenceResult, LoggingConfig, PackagesConfig, Profile, ProfileMetadata, QuiltConfig,
    SecurityConfig,
};
use benchling_webhook_core::arn::queue_url_from_arn;
use std::collections::BTreeMap;

pub const WIZARD_SOURCE: &str = "wizard";

/// Answer keys understood by [`profile_from_answers`].
pub mod keys {
    pub const TENANT: &str = "tenant";
    pub const CLIENT_ID: &str = "clientId";
    pub const CLIENT_SECRET: &str = "clientSecret";
    pub const APP_DEFINITION_ID: &str = "appDefinitionId";
    pub const CATALOG: &str = "catalog";
    pub const STACK_ARN: &str = "stackArn";
    pub const DATABASE: &str = "database";
    pub const QUEUE_URL: &str = "queueUrl";
    pub const REGION: &str = "region";
    pub const ACCOUNT: &str = "account";
    pub const BUCKET: &str = "bucket";
    pub const PREFIX: &str = "prefix";
    pub const METADATA_KEY: &str = "metadataKey";
    pub const ENABLE_VERIFICATION: &str = "enableVerification";
    pub const WEBHOOK_ALLOW_LIST: &str = "webhookAllowList";
    pub const LOG_LEVEL: &str = "logLevel";
}

pub fn profile_from_answers(
    answers: &BTreeMap<String, String>,
    inferred: Option<&InferenceResult>,
) -> Result<Profile> {
    let answer = |key: &str| {
        answers
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let inferred_queue = inferred
        .and_then(|i| i.queue_arn.as_deref())
        .and_then(queue_url_from_arn);
    let tenant = answer(keys::TENANT);
    let client_id = answer(keys::CLIENT_ID);
    let region = answer(keys::REGION).or_else(|| inferred.and_then(|i| i.quilt_region.clone()));

    let mut missing = Vec::new();
    if tenant.is_none() {
        missing.push(keys::TENANT);
    }
    if client_id.is_none() {
        missing.push(keys::CLIENT_ID);
    }
    if region.is_none() {
        missing.push(keys::REGION);
    }
    if !missing.is_empty() {
        return Err(ConfigError::Invalid {
            errors: missing
                .into_iter()
                .map(|key| format!("wizard answer '{}' is required", key))
                .collect(),
        });
    }
    let region = region.unwrap_or_default();

    let catalog = answer(keys::CATALOG)
        .or_else(|| inferred.map(|i| i.catalog_url.clone()))
        .map(|c| normalize_catalog(&c))
        .unwrap_or_default();

    let enable_verification = answer(keys::ENABLE_VERIFICATION)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "y" | "1"));
    let webhook_allow_list = answer(keys::WEBHOOK_ALLOW_LIST);
    let security = (enable_verification.is_some() || webhook_allow_list.is_some()).then(|| {
        SecurityConfig {
            enable_verification,
            webhook_allow_list,
        }
    });

    Ok(Profile {
        benchling: BenchlingConfig {
            tenant: tenant.unwrap_or_default(),
            client_id: client_id.unwrap_or_default(),
            client_secret: answer(keys::CLIENT_SECRET),
            secret_arn: None,
            app_definition_id: answer(keys::APP_DEFINITION_ID),
        },
        quilt: QuiltConfig {
            stack_arn: answer(keys::STACK_ARN)
                .or_else(|| inferred.and_then(|i| i.quilt_stack_arn.clone())),
            catalog,
            database: answer(keys::DATABASE).unwrap_or_default(),
            queue_url: answer(keys::QUEUE_URL)
                .or(inferred_queue)
                .unwrap_or_default(),
            region: region.clone(),
            ..Default::default()
        },
        packages: PackagesConfig {
            bucket: answer(keys::BUCKET)
                .or_else(|| inferred.and_then(|i| i.quilt_user_bucket.clone()))
                .unwrap_or_default(),
            prefix: answer(keys::PREFIX).unwrap_or_else(default_pkg_prefix),
            metadata_key: answer(keys::METADATA_KEY).unwrap_or_else(default_pkg_key),
        },
        deployment: DeploymentConfig {
            region,
            account: answer(keys::ACCOUNT),
            ..Default::default()
        },
        security,
        logging: answer(keys::LOG_LEVEL).map(|level| LoggingConfig { level: Some(level) }),
        metadata: ProfileMetadata::new(WIZARD_SOURCE),
        inherits: None,
        extensions: BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_answers_with_inference() {
        let inferred = InferenceResult {
            catalog_url: "https://quilt.example.com".to_string(),
            quilt_stack_arn: Some(
                "arn:aws:cloudformation:us-east-1:123456789012:stack/Quilt/abc".to_string(),
            ),
            quilt_user_bucket: Some("quilt-bucket".to_string()),
            queue_arn: Some("arn:aws:sqs:us-east-1:123456789012:packager".to_string()),
            quilt_region: Some("us-east-1".to_string()),
            source: "quilt3-cli+cloudformation".to_string(),
        };
        let profile = profile_from_answers(
            &answers(&[("tenant", "acme"), ("clientId", "id"), ("bucket", "mine")]),
            Some(&inferred),
        )
        .unwrap();

        assert_eq!(profile.quilt.catalog, "quilt.example.com");
        assert_eq!(
            profile.quilt.queue_url,
            "https://sqs.us-east-1.amazonaws.com/123456789012/packager"
        );
        assert_eq!(profile.packages.bucket, "mine");
        assert_eq!(profile.packages.prefix, "benchling");
        assert_eq!(profile.deployment.region, "us-east-1");
        assert_eq!(profile.metadata.source, WIZARD_SOURCE);
    }

    #[test]
    fn test_region_answer_beats_inferred_region() {
        let inferred = InferenceResult {
            catalog_url: "quilt.example.com".to_string(),
            quilt_region: Some("us-east-1".to_string()),
            source: "cloudformation".to_string(),
            ..Default::default()
        };
        let profile = profile_from_answers(
            &answers(&[("tenant", "acme"), ("clientId", "id"), ("region", "eu-west-1")]),
            Some(&inferred),
        )
        .unwrap();
        assert_eq!(profile.quilt.region, "eu-west-1");
        assert_eq!(profile.deployment.region, "eu-west-1");
    }

    #[test]
    fn test_required_answers() {
        let err = profile_from_answers(&answers(&[("tenant", " ")]), None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'tenant'"));
        assert!(message.contains("'clientId'"));
        assert!(message.contains("'region'"));
    }

    #[test]
    fn test_security_section_only_when_answered() {
        let base = [("tenant", "acme"), ("clientId", "id"), ("region", "eu-west-1")];
        let profile = profile_from_answers(&answers(&base), None).unwrap();
        assert!(profile.security.is_none());

        let mut with_security = base.to_vec();
        with_security.push(("enableVerification", "no"));
        let profile = profile_from_answers(&answers(&with_security), None).unwrap();
        assert_eq!(profile.security.unwrap().enable_verification, Some(false));
    }
}
