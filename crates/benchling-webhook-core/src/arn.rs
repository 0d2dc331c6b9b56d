//! ARN grammar for CloudFormation stacks, Secrets Manager secrets and SQS queues
//!
//! Pure string handling; nothing here performs I/O.

use crate::error::{ErrorCode, Remediation};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const STACK_ARN_EXAMPLE: &str =
    "arn:aws:cloudformation:us-east-1:123456789012:stack/QuiltStack/abc-123";
pub const SECRET_ARN_EXAMPLE: &str =
    "arn:aws:secretsmanager:us-east-1:123456789012:secret:quiltdata/benchling-webhook-AbCdEf";

static REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").expect("static region regex"));
static ACCOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12}$").expect("static account regex"));
static SECRET_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9/_+=.@-]+$").expect("static secret name regex"));
static QUEUE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://sqs\.[a-z0-9-]+\.amazonaws\.com/\d{12}/[A-Za-z0-9_-]+(\.fifo)?$")
        .expect("static queue url regex")
});

/// An ARN that failed to parse, with a corrective example.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid ARN '{arn}': {reason}. Expected format: {example}")]
pub struct InvalidArn {
    pub arn: String,
    pub reason: String,
    pub example: &'static str,
}

impl Remediation for InvalidArn {
    fn code(&self) -> ErrorCode {
        ErrorCode::E001InvalidArn
    }

    fn remediation(&self) -> String {
        format!(
            "Copy the ARN from the AWS console or CLI; it should look like {}",
            self.example
        )
    }
}

/// Components of a CloudFormation stack ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackArn {
    pub region: String,
    pub account: String,
    pub stack_name: String,
    pub stack_id: String,
}

impl std::fmt::Display for StackArn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arn:aws:cloudformation:{}:{}:stack/{}/{}",
            self.region, self.account, self.stack_name, self.stack_id
        )
    }
}

/// Result of checking a Secrets Manager ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretArnValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Splits `arn:<partition>:<service>:<region>:<account>:<resource>` and checks
/// everything up to the resource segment. Returns (region, account, resource).
fn split_arn<'a>(
    arn: &'a str,
    service: &str,
    example: &'static str,
) -> Result<(&'a str, &'a str, &'a str), InvalidArn> {
    let fail = |reason: String| InvalidArn {
        arn: arn.to_string(),
        reason,
        example,
    };

    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() != 6 || parts[0] != "arn" {
        return Err(fail("not an ARN".to_string()));
    }
    if parts[1] != "aws" {
        return Err(fail(format!("unsupported partition '{}'", parts[1])));
    }
    if parts[2] != service {
        return Err(fail(format!(
            "expected service '{}', found '{}'",
            service, parts[2]
        )));
    }
    if parts[3].is_empty() {
        return Err(fail("missing region".to_string()));
    }
    if !REGION.is_match(parts[3]) {
        return Err(fail(format!("invalid region '{}'", parts[3])));
    }
    if !ACCOUNT.is_match(parts[4]) {
        return Err(fail(format!(
            "account '{}' must be exactly 12 digits",
            parts[4]
        )));
    }
    Ok((parts[3], parts[4], parts[5]))
}

/// Parse `arn:aws:cloudformation:<region>:<account>:stack/<name>/<id>`.
pub fn parse_stack_arn(arn: &str) -> Result<StackArn, InvalidArn> {
    let arn = arn.trim();
    let (region, account, resource) = split_arn(arn, "cloudformation", STACK_ARN_EXAMPLE)?;

    let fail = |reason: &str| InvalidArn {
        arn: arn.to_string(),
        reason: reason.to_string(),
        example: STACK_ARN_EXAMPLE,
    };

    let rest = resource
        .strip_prefix("stack/")
        .ok_or_else(|| fail("resource must start with 'stack/'"))?;
    let (stack_name, stack_id) = rest
        .split_once('/')
        .ok_or_else(|| fail("missing stack id after stack name"))?;
    if stack_name.is_empty() {
        return Err(fail("missing stack name"));
    }
    if stack_id.is_empty() {
        return Err(fail("missing stack id"));
    }

    Ok(StackArn {
        region: region.to_string(),
        account: account.to_string(),
        stack_name: stack_name.to_string(),
        stack_id: stack_id.to_string(),
    })
}

/// Check `arn:aws:secretsmanager:<region>:<account>:secret:<name>[-suffix]`.
///
/// Unlike [`parse_stack_arn`] this collects every problem instead of stopping
/// at the first one.
pub fn validate_secret_arn(arn: &str) -> SecretArnValidation {
    let arn = arn.trim();
    let mut errors = Vec::new();

    let parts: Vec<&str> = arn.splitn(7, ':').collect();
    if parts.len() != 7 || parts[0] != "arn" {
        errors.push(format!(
            "'{}' is not a Secrets Manager ARN (expected {})",
            arn, SECRET_ARN_EXAMPLE
        ));
        return SecretArnValidation {
            valid: false,
            errors,
        };
    }

    if parts[1] != "aws" {
        errors.push(format!("unsupported partition '{}'", parts[1]));
    }
    if parts[2] != "secretsmanager" {
        errors.push(format!(
            "expected service 'secretsmanager', found '{}'",
            parts[2]
        ));
    }
    if parts[3].is_empty() {
        errors.push("missing region".to_string());
    } else if !REGION.is_match(parts[3]) {
        errors.push(format!("invalid region '{}'", parts[3]));
    }
    if !ACCOUNT.is_match(parts[4]) {
        errors.push(format!("account '{}' must be exactly 12 digits", parts[4]));
    }
    if parts[5] != "secret" {
        errors.push(format!(
            "resource type must be 'secret', found '{}'",
            parts[5]
        ));
    }
    if parts[6].is_empty() {
        errors.push("missing secret name".to_string());
    } else if !SECRET_NAME.is_match(parts[6]) {
        errors.push(format!(
            "secret name '{}' contains characters outside [A-Za-z0-9/_+=.@-]",
            parts[6]
        ));
    }

    SecretArnValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// True when `value` looks like a Secrets Manager ARN (prefix only).
pub fn is_secret_arn(value: &str) -> bool {
    value.trim().starts_with("arn:aws:secretsmanager:")
}

/// Region segment of any well-formed ARN.
pub fn arn_region(arn: &str) -> Option<&str> {
    let region = arn.split(':').nth(3)?;
    REGION.is_match(region).then_some(region)
}

/// Redact the account segment of a Secrets Manager ARN, keeping its last four
/// digits. Anything else is returned unchanged. Display only.
pub fn mask_arn(arn: &str) -> String {
    if !is_secret_arn(arn) {
        return arn.to_string();
    }
    let mut parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() != 6 || !ACCOUNT.is_match(parts[4]) {
        return arn.to_string();
    }
    let masked = format!("****{}", &parts[4][8..]);
    parts[4] = &masked;
    parts.join(":")
}

/// Translate `arn:aws:sqs:<region>:<account>:<name>` into its queue URL.
pub fn queue_url_from_arn(arn: &str) -> Option<String> {
    let parts: Vec<&str> = arn.trim().split(':').collect();
    if parts.len() != 6 || parts[0] != "arn" || parts[2] != "sqs" {
        return None;
    }
    if !REGION.is_match(parts[3]) || !ACCOUNT.is_match(parts[4]) || parts[5].is_empty() {
        return None;
    }
    Some(format!(
        "https://sqs.{}.amazonaws.com/{}/{}",
        parts[3], parts[4], parts[5]
    ))
}

/// True when `url` has the `https://sqs.<region>.amazonaws.com/<account>/<name>` shape.
pub fn is_queue_url(url: &str) -> bool {
    QUEUE_URL.is_match(url.trim())
}
