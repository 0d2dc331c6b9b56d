// Deployment-readiness validation
//
// Every problem is collected before returning. Missing fields are split into
// those the operator must supply and those inference should have filled.

use crate::sources::DeployConfig;
use benchling_webhook_core::arn::is_secret_arn;
use serde::Serialize;
use tracing::warn;

/// One missing or unusable field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
    /// Stack or account inference could have supplied this field
    pub can_infer: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Errors the operator has to fix by hand.
    pub fn must_provide(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter().filter(|e| !e.can_infer)
    }

    /// Errors that inference failed to resolve.
    pub fn not_inferred(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter().filter(|e| e.can_infer)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

pub fn validate_config(config: &DeployConfig) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Only a secret ARN defers credentials to the remote store. Inline and
    // @file payloads are merged into the config fields before validation.
    let remote_secret = config
        .benchling_secrets
        .as_deref()
        .map_or(false, is_secret_arn);

    let mut require = |value: &Option<String>, field: &str, message: &str, can_infer: bool| {
        if is_blank(value) {
            errors.push(FieldError {
                field: field.to_string(),
                message: message.to_string(),
                can_infer,
            });
        }
    };

    require(
        &config.quilt_catalog,
        "quiltCatalog",
        "Quilt catalog URL is required (QUILT_CATALOG or --catalog)",
        false,
    );
    require(
        &config.benchling_tenant,
        "benchlingTenant",
        "Benchling tenant is required (BENCHLING_TENANT)",
        false,
    );

    if !remote_secret {
        require(
            &config.benchling_client_id,
            "benchlingClientId",
            "Benchling OAuth client ID is required (BENCHLING_CLIENT_ID)",
            false,
        );
        require(
            &config.benchling_client_secret,
            "benchlingClientSecret",
            "Benchling OAuth client secret is required (BENCHLING_CLIENT_SECRET)",
            false,
        );
    }

    require(
        &config.cdk_account,
        "cdkAccount",
        "AWS account ID could not be determined (CDK_DEFAULT_ACCOUNT)",
        true,
    );
    require(
        &config.cdk_region,
        "cdkRegion",
        "AWS region could not be determined (CDK_DEFAULT_REGION or AWS_REGION)",
        true,
    );
    require(
        &config.queue_url,
        "queueUrl",
        "Packager queue URL could not be inferred from the Quilt stack (QUEUE_URL)",
        true,
    );
    require(
        &config.quilt_database,
        "quiltDatabase",
        "Quilt Athena database could not be inferred from the Quilt stack (QUILT_DATABASE)",
        true,
    );

    if config.enable_webhook_verification.unwrap_or(true) && !remote_secret {
        require(
            &config.benchling_app_definition_id,
            "benchlingAppDefinitionId",
            "App definition ID is required when webhook verification is enabled (BENCHLING_APP_DEFINITION_ID)",
            false,
        );
    }

    if let Some(catalog) = config.quilt_catalog.as_deref() {
        if catalog.contains("://") {
            warnings.push(format!(
                "quiltCatalog '{}' includes a URL scheme; use the bare domain",
                catalog
            ));
        }
    }

    if let Some(bucket) = config.quilt_user_bucket.as_deref() {
        if let Err(reason) = validate_bucket_name(bucket) {
            warnings.push(format!("quiltUserBucket '{}': {}", bucket, reason));
        }
    }

    for warning in &warnings {
        warn!("{}", warning);
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// DNS-safe S3 bucket naming.
pub fn validate_bucket_name(input: &str) -> Result<(), String> {
    if input.len() < 3 || input.len() > 63 {
        return Err("Bucket name must be 3-63 characters".to_string());
    }
    if !input
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(
            "Bucket name must contain only lowercase letters, numbers, dots, and hyphens"
                .to_string(),
        );
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edge_ok(input.chars().next()) || !edge_ok(input.chars().last()) {
        return Err("Bucket name must start and end with a letter or number".to_string());
    }
    if input.contains("..") {
        return Err("Bucket name cannot contain consecutive dots".to_string());
    }
    if input.parse::<std::net::Ipv4Addr>().is_ok() {
        return Err("Bucket name cannot be formatted as an IP address".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> DeployConfig {
        DeployConfig {
            cdk_account: Some("123456789012".to_string()),
            cdk_region: Some("us-east-1".to_string()),
            quilt_catalog: Some("quilt.example.com".to_string()),
            quilt_database: Some("quilt_db".to_string()),
            quilt_user_bucket: Some("acme-data".to_string()),
            queue_url: Some("https://sqs.us-east-1.amazonaws.com/123456789012/q".to_string()),
            benchling_tenant: Some("acme".to_string()),
            benchling_client_id: Some("id".to_string()),
            benchling_client_secret: Some("secret".to_string()),
            benchling_app_definition_id: Some("appdef_1".to_string()),
            enable_webhook_verification: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_config_is_valid() {
        let result = validate_config(&complete());
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_errors_split_by_can_infer() {
        let result = validate_config(&DeployConfig {
            enable_webhook_verification: Some(false),
            ..Default::default()
        });
        assert!(!result.valid);

        let user: Vec<_> = result.must_provide().map(|e| e.field.as_str()).collect();
        assert_eq!(
            user,
            vec![
                "quiltCatalog",
                "benchlingTenant",
                "benchlingClientId",
                "benchlingClientSecret"
            ]
        );
        let inferable: Vec<_> = result.not_inferred().map(|e| e.field.as_str()).collect();
        assert_eq!(
            inferable,
            vec!["cdkAccount", "cdkRegion", "queueUrl", "quiltDatabase"]
        );
    }

    #[test]
    fn test_verification_requires_app_definition() {
        let mut config = complete();
        config.benchling_app_definition_id = None;
        let result = validate_config(&config);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "benchlingAppDefinitionId");

        config.enable_webhook_verification = Some(false);
        assert!(validate_config(&config).valid);
    }

    #[test]
    fn test_secrets_reference_replaces_credentials() {
        let mut config = complete();
        config.benchling_client_id = None;
        config.benchling_client_secret = None;
        config.benchling_secrets =
            Some("arn:aws:secretsmanager:us-east-1:123456789012:secret:bw".to_string());
        assert!(validate_config(&config).valid);
    }

    #[test]
    fn test_inline_secrets_without_app_definition_still_required() {
        let mut config = complete();
        config.benchling_app_definition_id = None;
        config.benchling_secrets =
            Some(r#"{"client_id":"id","client_secret":"s","tenant":"acme"}"#.to_string());
        let result = validate_config(&config);
        assert!(!result.valid);
        assert_eq!(result.errors[0].field, "benchlingAppDefinitionId");

        config.benchling_secrets =
            Some("arn:aws:secretsmanager:us-east-1:123456789012:secret:bw".to_string());
        assert!(validate_config(&config).valid);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut config = complete();
        config.quilt_catalog = Some("https://quilt.example.com".to_string());
        config.quilt_user_bucket = Some("Bad_Bucket".to_string());
        let result = validate_config(&config);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].contains("URL scheme"));
    }

    #[test]
    fn test_bucket_names() {
        assert!(validate_bucket_name("my-bucket.data").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("a..b").is_err());
        assert!(validate_bucket_name("192.168.1.1").is_err());
    }
}
