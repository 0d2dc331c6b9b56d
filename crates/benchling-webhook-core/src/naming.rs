//! Secret naming and placeholder detection

/// Prefix of every secret created for a profile.
pub const SECRET_NAME_PREFIX: &str = "quiltdata/benchling-webhook";

/// The reserved, non-deletable profile.
pub const DEFAULT_PROFILE: &str = "default";

/// Deterministic Secrets Manager name for a profile/tenant pair.
pub fn secret_name(profile: &str, tenant: &str) -> String {
    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || "/_+=.@-".contains(c) {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    };
    format!(
        "{}/{}/{}",
        SECRET_NAME_PREFIX,
        sanitize(profile),
        sanitize(tenant)
    )
}

/// A locally held client secret is a placeholder when it was never resolved
/// to a real value: absent, empty, or just a pointer at the secret itself.
pub fn is_placeholder_secret(
    client_secret: Option<&str>,
    secret_name: &str,
    secret_arn: Option<&str>,
) -> bool {
    match client_secret.map(str::trim) {
        None | Some("") => true,
        Some(value) => value == secret_name || Some(value) == secret_arn,
    }
}
