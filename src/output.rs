//! Operator-facing rendering of errors, reports and profiles

use benchling_webhook_aws::{ResolveError, SyncReport};
use benchling_webhook_config::{ConfigError, Profile, ValidationResult};
use benchling_webhook_core::{mask_arn, ErrorCode, InvalidArn, Remediation};
use serde_json::Value;
use std::fmt::Write;

/// Code and remediation of the first typed error in the chain.
pub fn classify_error(err: &anyhow::Error) -> Option<(ErrorCode, String)> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<ResolveError>() {
            return Some((e.code(), e.remediation()));
        }
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return Some((e.code(), e.remediation()));
        }
        cause
            .downcast_ref::<InvalidArn>()
            .map(|e| (e.code(), e.remediation()))
    })
}

/// `[E0xx] message` followed by the remediation line.
pub fn render_error(err: &anyhow::Error) -> String {
    match classify_error(err) {
        Some((code, remediation)) => format!("[{}] {:#}\n  -> {}", code, err, remediation),
        None => format!("{:#}", err),
    }
}

/// Profile as JSON with ARNs masked and the client secret hidden.
pub fn masked_profile(profile: &Profile) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(profile)?;
    mask_arns(&mut value);
    if let Some(secret) = value.pointer_mut("/benchling/clientSecret") {
        *secret = Value::String("***".to_string());
    }
    Ok(value)
}

fn mask_arns(value: &mut Value) {
    match value {
        Value::String(s) if s.starts_with("arn:") => *s = mask_arn(s),
        Value::Array(items) => items.iter_mut().for_each(mask_arns),
        Value::Object(map) => map.values_mut().for_each(mask_arns),
        _ => {}
    }
}

pub fn render_sync_report(report: &SyncReport) -> String {
    let mut out = String::new();
    let width = report
        .records
        .iter()
        .map(|r| r.profile.len())
        .chain(report.failures.iter().map(|f| f.profile.len()))
        .max()
        .unwrap_or(0)
        .max("PROFILE".len());

    let _ = writeln!(out, "{:<width$}  {:<8}  SECRET", "PROFILE", "ACTION");
    for record in &report.records {
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {}",
            record.profile,
            record.action.to_string(),
            record.secret_name
        );
    }
    for failure in &report.failures {
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  [{}] {}",
            failure.profile,
            "failed",
            failure.error.code(),
            failure.error
        );
    }
    out
}

/// Errors grouped into "you must provide" and "could not be inferred".
pub fn render_validation(result: &ValidationResult) -> String {
    let mut out = String::new();
    if result.valid {
        let _ = writeln!(out, "Configuration is valid");
    }

    let must: Vec<_> = result.must_provide().collect();
    if !must.is_empty() {
        let _ = writeln!(out, "Missing required values:");
        for error in must {
            let _ = writeln!(out, "  - {}: {}", error.field, error.message);
        }
    }

    let inferable: Vec<_> = result.not_inferred().collect();
    if !inferable.is_empty() {
        let _ = writeln!(out, "Could not infer (set explicitly or pass --infer):");
        for error in inferable {
            let _ = writeln!(out, "  - {}: {}", error.field, error.message);
        }
    }

    for warning in &result.warnings {
        let _ = writeln!(out, "warning: {}", warning);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use benchling_webhook_aws::{SyncAction, SyncFailure, SyncRecord};
    use benchling_webhook_config::FieldError;

    #[test]
    fn test_render_error_finds_code_through_context() {
        let err = Err::<(), _>(ConfigError::ProfileProtected {
            profile: "default".to_string(),
        })
        .context("Failed to delete profile")
        .unwrap_err();
        let rendered = render_error(&err);
        assert!(rendered.starts_with("[E013] Failed to delete profile"));
        assert!(rendered.contains("\n  -> "));

        let plain = anyhow::anyhow!("boom");
        assert_eq!(render_error(&plain), "boom");
    }

    #[test]
    fn test_sync_report_table() {
        let report = SyncReport {
            records: vec![SyncRecord {
                profile: "default".to_string(),
                secret_name: "quiltdata/benchling-webhook/default/acme".to_string(),
                secret_arn: "arn".to_string(),
                action: SyncAction::Skipped,
            }],
            failures: vec![SyncFailure {
                profile: "staging".to_string(),
                error: ResolveError::SecretNotFound {
                    secret: "gone".to_string(),
                },
            }],
        };
        let table = render_sync_report(&report);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("default  skipped"));
        assert!(lines[2].contains("[E003]"));
    }

    #[test]
    fn test_validation_groups() {
        let result = ValidationResult {
            valid: false,
            errors: vec![
                FieldError {
                    field: "benchlingTenant".to_string(),
                    message: "required".to_string(),
                    can_infer: false,
                },
                FieldError {
                    field: "queueUrl".to_string(),
                    message: "required".to_string(),
                    can_infer: true,
                },
            ],
            warnings: vec!["catalog has a scheme".to_string()],
        };
        let text = render_validation(&result);
        let must = text.find("Missing required values").unwrap();
        let infer = text.find("Could not infer").unwrap();
        assert!(must < infer);
        assert!(text.contains("warning: catalog has a scheme"));
    }
}
