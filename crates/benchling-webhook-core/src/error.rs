//! Error codes shared by every benchling-webhook crate
//!
//! Each operator-facing error carries a stable code for programmatic handling
//! and a remediation hint that is kept separate from its display message.

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// E001: ARN does not match the expected grammar
    E001InvalidArn,
    /// E002: CloudFormation stack could not be found
    E002StackNotFound,
    /// E003: Secret does not exist
    E003SecretNotFound,
    /// E004: Caller lacks permission to read or write the secret
    E004SecretAccessDenied,
    /// E005: Secret exists but its payload is unusable
    E005MalformedSecret,
    /// E006: Stack is missing required outputs
    E006MissingOutputs,
    /// E007: Profile document does not exist
    E007ConfigNotFound,
    /// E008: Profile document is not valid JSON
    E008ConfigParse,
    /// E009: Profile document violates the schema
    E009ConfigSchema,
    /// E010: Configuration is not deployment-ready
    E010Validation,
    /// E011: Stack outputs do not identify a catalog
    E011CannotDetermineCatalog,
    /// E012: Catalog config.json could not be fetched or parsed
    E012CatalogFetch,
    /// E013: Operation refused on a protected profile
    E013ProfileProtected,
    /// E014: AWS service call failed
    E014AwsService,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidArn => "E001",
            Self::E002StackNotFound => "E002",
            Self::E003SecretNotFound => "E003",
            Self::E004SecretAccessDenied => "E004",
            Self::E005MalformedSecret => "E005",
            Self::E006MissingOutputs => "E006",
            Self::E007ConfigNotFound => "E007",
            Self::E008ConfigParse => "E008",
            Self::E009ConfigSchema => "E009",
            Self::E010Validation => "E010",
            Self::E011CannotDetermineCatalog => "E011",
            Self::E012CatalogFetch => "E012",
            Self::E013ProfileProtected => "E013",
            Self::E014AwsService => "E014",
        }
    }

    pub fn docs_url(&self) -> String {
        format!(
            "https://github.com/quiltdata/benchling-webhook/blob/main/docs/troubleshooting.md#{}",
            self.as_str().to_lowercase()
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every error that reaches an operator.
pub trait Remediation {
    /// Machine-readable kind
    fn code(&self) -> ErrorCode;

    /// What the operator should do next
    fn remediation(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let codes = [
            ErrorCode::E001InvalidArn,
            ErrorCode::E002StackNotFound,
            ErrorCode::E003SecretNotFound,
            ErrorCode::E004SecretAccessDenied,
            ErrorCode::E005MalformedSecret,
            ErrorCode::E006MissingOutputs,
            ErrorCode::E007ConfigNotFound,
            ErrorCode::E008ConfigParse,
            ErrorCode::E009ConfigSchema,
            ErrorCode::E010Validation,
            ErrorCode::E011CannotDetermineCatalog,
            ErrorCode::E012CatalogFetch,
            ErrorCode::E013ProfileProtected,
            ErrorCode::E014AwsService,
        ];
        let unique: std::collections::HashSet<_> = codes.iter().map(|c| c.as_str()).collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_docs_url_uses_lowercase_anchor() {
        assert!(ErrorCode::E006MissingOutputs.docs_url().ends_with("#e006"));
    }
}
