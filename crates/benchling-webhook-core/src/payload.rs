//! JSON document stored in Secrets Manager for the webhook runtime

use serde::{Deserialize, Deserializer, Serialize};

/// Snake_case secret value consumed by the webhook runtime.
///
/// `client_secret` is redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    pub client_id: String,
    pub client_secret: String,
    pub tenant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_definition_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_allow_list: Option<String>,
    /// Written as `"true"`/`"false"`; a JSON boolean is accepted on read.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flag_as_string"
    )]
    pub enable_webhook_verification: Option<String>,
}

fn flag_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(Option::<Flag>::deserialize(deserializer)?.map(|flag| match flag {
        Flag::Bool(value) => value.to_string(),
        Flag::Text(value) => value,
    }))
}

impl SecretPayload {
    /// Fields that must be present and non-empty in every stored secret.
    pub const REQUIRED_FIELDS: [&'static str; 3] = ["client_id", "client_secret", "tenant"];

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPayload")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("tenant", &self.tenant)
            .field("app_definition_id", &self.app_definition_id)
            .field("api_url", &self.api_url)
            .field("user_bucket", &self.user_bucket)
            .field("pkg_prefix", &self.pkg_prefix)
            .field("pkg_key", &self.pkg_key)
            .field("log_level", &self.log_level)
            .field("webhook_allow_list", &self.webhook_allow_list)
            .field(
                "enable_webhook_verification",
                &self.enable_webhook_verification,
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_omitted() {
        let payload = SecretPayload {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            tenant: "acme".to_string(),
            ..Default::default()
        };
        let json = payload.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"client_id":"id","client_secret":"secret","tenant":"acme"}"#
        );
    }

    #[test]
    fn test_verification_flag_accepts_bool_or_string() {
        let payload: SecretPayload = serde_json::from_str(
            r#"{"client_id":"id","client_secret":"s","tenant":"acme","enable_webhook_verification":false}"#,
        )
        .unwrap();
        assert_eq!(payload.enable_webhook_verification.as_deref(), Some("false"));
        assert!(payload
            .to_json()
            .unwrap()
            .contains(r#""enable_webhook_verification":"false""#));

        let payload: SecretPayload = serde_json::from_str(
            r#"{"client_id":"id","client_secret":"s","tenant":"acme","enable_webhook_verification":"true"}"#,
        )
        .unwrap();
        assert_eq!(payload.enable_webhook_verification.as_deref(), Some("true"));
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let payload = SecretPayload {
            client_secret: "super-secret-value".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", payload);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("***"));
    }
}
