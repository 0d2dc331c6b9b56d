//! Interpretation of the `--benchling-secrets` / `BENCHLING_SECRETS` value

use crate::error::{ConfigError, Result};
use benchling_webhook_core::arn::{is_secret_arn, validate_secret_arn};
use benchling_webhook_core::SecretPayload;
use serde_json::Value;
use std::path::Path;

/// A secret reference or an inline credential document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchlingSecretsInput {
    Arn(String),
    Json(SecretPayload),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::SecretsInput {
        message: message.into(),
    }
}

/// Accepts a Secrets Manager ARN, a JSON object, or `@<path>` naming a file
/// (relative to `cwd`) that holds either.
pub fn process_benchling_secrets_input(input: &str, cwd: &Path) -> Result<BenchlingSecretsInput> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("value is empty"));
    }

    let content = match trimmed.strip_prefix('@') {
        Some(file) => read_reference(file, cwd)?,
        None => trimmed.to_string(),
    };

    if is_secret_arn(&content) {
        let validation = validate_secret_arn(&content);
        if !validation.valid {
            return Err(invalid(validation.errors.join("; ")));
        }
        return Ok(BenchlingSecretsInput::Arn(content));
    }

    if content.starts_with('{') {
        return parse_payload(&content).map(BenchlingSecretsInput::Json);
    }

    Err(invalid(format!(
        "expected a Secrets Manager ARN, a JSON object, or @file; got '{}'",
        content.chars().take(40).collect::<String>()
    )))
}

fn read_reference(file: &str, cwd: &Path) -> Result<String> {
    let path = cwd.join(file);
    let absolute = std::path::absolute(&path).unwrap_or(path);

    if absolute.is_dir() {
        return Err(invalid(format!("{} is a directory", absolute.display())));
    }
    let content = std::fs::read_to_string(&absolute).map_err(|e| {
        invalid(format!("cannot read {}: {}", absolute.display(), e))
    })?;
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(invalid(format!("{} is empty", absolute.display())));
    }
    Ok(content)
}

fn parse_payload(content: &str) -> Result<SecretPayload> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| invalid(format!("invalid JSON: {}", e)))?;
    let Some(map) = value.as_object() else {
        return Err(invalid("JSON value must be an object"));
    };

    let missing: Vec<&str> = SecretPayload::REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| {
            map.get(*field)
                .and_then(Value::as_str)
                .map_or(true, |v| v.trim().is_empty())
        })
        .collect();
    if !missing.is_empty() {
        return Err(invalid(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    }

    serde_json::from_value(value).map_err(|e| invalid(format!("invalid field type: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:secretsmanager:us-east-1:123456789012:secret:benchling-AbCdEf";

    #[test]
    fn test_literal_arn() {
        let cwd = std::env::temp_dir();
        assert_eq!(
            process_benchling_secrets_input(ARN, &cwd).unwrap(),
            BenchlingSecretsInput::Arn(ARN.to_string())
        );
    }

    #[test]
    fn test_malformed_arn_rejected() {
        let cwd = std::env::temp_dir();
        let err = process_benchling_secrets_input(
            "arn:aws:secretsmanager:us-east-1:12345:secret:x",
            &cwd,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SecretsInput { .. }));
    }

    #[test]
    fn test_literal_json() {
        let cwd = std::env::temp_dir();
        let input = r#"{"client_id":"id","client_secret":"s","tenant":"acme","app_definition_id":"app"}"#;
        match process_benchling_secrets_input(input, &cwd).unwrap() {
            BenchlingSecretsInput::Json(payload) => {
                assert_eq!(payload.tenant, "acme");
                assert_eq!(payload.app_definition_id.as_deref(), Some("app"));
            }
            other => panic!("expected JSON, got {:?}", other),
        }
    }

    #[test]
    fn test_json_missing_fields_named() {
        let cwd = std::env::temp_dir();
        let err = process_benchling_secrets_input(r#"{"client_id":"id"}"#, &cwd).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("client_secret"));
        assert!(message.contains("tenant"));
    }

    #[test]
    fn test_file_reference_relative_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret.txt"), format!("  {}\n", ARN)).unwrap();
        assert_eq!(
            process_benchling_secrets_input("@secret.txt", dir.path()).unwrap(),
            BenchlingSecretsInput::Arn(ARN.to_string())
        );
    }

    #[test]
    fn test_missing_file_reports_absolute_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = process_benchling_secrets_input("@nope.json", dir.path()).unwrap_err();
        let expected = dir.path().join("nope.json");
        assert!(err.to_string().contains(&expected.display().to_string()));
    }

    #[test]
    fn test_directory_reference_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let err = process_benchling_secrets_input("@sub", dir.path()).unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }
}
