//! Benchling credential secret fetch and validation

use crate::error::{ResolveError, Result};
use crate::provider::{AwsProvider, SecretValue};
use benchling_webhook_core::arn::{arn_region, is_secret_arn, validate_secret_arn};
use benchling_webhook_core::{mask_arn, SecretPayload};
use serde_json::Value;
use tracing::{debug, instrument};

/// Parse and structurally check a stored secret value.
///
/// `app_definition_id` is optional; without it verification-dependent features
/// are disabled downstream, but the secret is still valid.
pub fn parse_secret_payload(secret: &str, value: &SecretValue) -> Result<SecretPayload> {
    let text = match value {
        SecretValue::String(text) => text,
        SecretValue::Binary(_) => {
            return Err(ResolveError::BinarySecret {
                secret: secret.to_string(),
            })
        }
    };

    let json: Value = serde_json::from_str(text).map_err(|e| ResolveError::InvalidSecretJson {
        secret: secret.to_string(),
        message: e.to_string(),
    })?;
    let Some(map) = json.as_object() else {
        return Err(ResolveError::InvalidSecretJson {
            secret: secret.to_string(),
            message: "top-level value must be an object".to_string(),
        });
    };

    let missing: Vec<String> = SecretPayload::REQUIRED_FIELDS
        .iter()
        .filter(|field| {
            map.get(**field)
                .and_then(Value::as_str)
                .map_or(true, |v| v.trim().is_empty())
        })
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ResolveError::MissingSecretField {
            secret: secret.to_string(),
            fields: missing,
        });
    }

    serde_json::from_value(json).map_err(|e| ResolveError::InvalidSecretJson {
        secret: secret.to_string(),
        message: e.to_string(),
    })
}

pub struct SecretResolver<P: AwsProvider> {
    aws: P,
}

impl<P: AwsProvider> SecretResolver<P> {
    pub fn new(aws: P) -> Self {
        Self { aws }
    }

    /// Fetch a secret by ARN (in the ARN's region) or by name (in `default_region`).
    #[instrument(skip(self, secret_ref), fields(secret = %mask_arn(secret_ref)))]
    pub async fn resolve(&self, secret_ref: &str, default_region: &str) -> Result<SecretPayload> {
        let secret_ref = secret_ref.trim();
        let region = if is_secret_arn(secret_ref) {
            let validation = validate_secret_arn(secret_ref);
            if !validation.valid {
                return Err(ResolveError::InvalidArn(benchling_webhook_core::InvalidArn {
                    arn: secret_ref.to_string(),
                    reason: validation.errors.join("; "),
                    example: benchling_webhook_core::arn::SECRET_ARN_EXAMPLE,
                }));
            }
            arn_region(secret_ref).unwrap_or(default_region)
        } else {
            default_region
        };

        let value = self
            .aws
            .get_secret_value(region, secret_ref)
            .await
            .map_err(|e| ResolveError::from_secret_call(secret_ref, e))?;
        let payload = parse_secret_payload(secret_ref, &value)?;
        debug!(
            tenant = %payload.tenant,
            has_app_definition = payload.app_definition_id.is_some(),
            "Resolved Benchling secret"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAwsProvider;
    use crate::provider::AwsError;

    fn string(value: &str) -> SecretValue {
        SecretValue::String(value.to_string())
    }

    #[test]
    fn test_valid_payload_without_app_definition() {
        let payload = parse_secret_payload(
            "s",
            &string(r#"{"client_id":"id","client_secret":"sh","tenant":"acme","api_url":"https://acme.benchling.com"}"#),
        )
        .unwrap();
        assert_eq!(payload.tenant, "acme");
        assert!(payload.app_definition_id.is_none());
        assert_eq!(payload.api_url.as_deref(), Some("https://acme.benchling.com"));
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            parse_secret_payload("s", &SecretValue::Binary(vec![1, 2])),
            Err(ResolveError::BinarySecret { .. })
        ));
        assert!(matches!(
            parse_secret_payload("s", &string("not json")),
            Err(ResolveError::InvalidSecretJson { .. })
        ));
        assert!(matches!(
            parse_secret_payload("s", &string("[1]")),
            Err(ResolveError::InvalidSecretJson { .. })
        ));
        match parse_secret_payload("s", &string(r#"{"client_id":"id","tenant":""}"#)) {
            Err(ResolveError::MissingSecretField { fields, .. }) => {
                assert_eq!(fields, vec!["client_secret", "tenant"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_by_name_and_arn() {
        let body = r#"{"client_id":"id","client_secret":"sh","tenant":"acme"}"#;
        let aws = MockAwsProvider::new().with_secret("eu-west-1", "bw/acme", string(body));
        let resolver = SecretResolver::new(aws.clone());

        let by_name = resolver.resolve("bw/acme", "eu-west-1").await.unwrap();
        assert_eq!(by_name.client_id, "id");

        let arn = "arn:aws:secretsmanager:eu-west-1:123456789012:secret:bw/acme-AbCdEf";
        let by_arn = resolver.resolve(arn, "us-east-1").await.unwrap();
        assert_eq!(by_arn, by_name);
    }

    #[tokio::test]
    async fn test_not_found_and_access_denied() {
        let resolver = SecretResolver::new(MockAwsProvider::new());
        assert!(matches!(
            resolver.resolve("missing", "us-east-1").await,
            Err(ResolveError::SecretNotFound { .. })
        ));

        let denied = MockAwsProvider::new().fail(
            "get_secret_value",
            AwsError::AccessDenied {
                resource: "x".to_string(),
                message: "not authorized".to_string(),
            },
        );
        assert!(matches!(
            SecretResolver::new(denied).resolve("x", "us-east-1").await,
            Err(ResolveError::SecretAccessDenied { .. })
        ));
    }
}
