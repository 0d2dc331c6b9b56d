// benchling-webhook-core - Shared primitives
//
// ARN grammar, the Secrets Manager payload, secret naming rules and the
// error-code catalogue used by the config and aws crates.

pub mod arn;
pub mod error;
pub mod naming;
pub mod payload;

pub use arn::{
    mask_arn, parse_stack_arn, validate_secret_arn, InvalidArn, SecretArnValidation, StackArn,
};
pub use error::{ErrorCode, Remediation};
pub use naming::{is_placeholder_secret, secret_name, DEFAULT_PROFILE};
pub use payload::SecretPayload;
