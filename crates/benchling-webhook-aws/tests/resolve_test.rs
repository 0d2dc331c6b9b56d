use benchling_webhook_aws::mock::MockAwsProvider;
use benchling_webhook_aws::{ConfigResolver, ResolveError, SecretValue, StackDescription};
use benchling_webhook_core::{ErrorCode, Remediation};

const STACK_ARN: &str = "arn:aws:cloudformation:us-east-1:123456789012:stack/QuiltStack/abc-123";
const SECRET_NAME: &str = "quiltdata/benchling-webhook/default/acme";

fn quilt_stack() -> StackDescription {
    StackDescription {
        stack_name: "QuiltStack".to_string(),
        stack_id: Some(STACK_ARN.to_string()),
        outputs: [
            ("UserAthenaDatabaseName", "quilt_test_db"),
            ("PackagerQueueArn", "arn:aws:sqs:us-east-1:123456789012:test-queue"),
            ("UserBucket", "test-user-bucket"),
            ("Catalog", "test.quilt.com"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
        ..Default::default()
    }
}

fn secret(body: &str) -> SecretValue {
    SecretValue::String(body.to_string())
}

#[tokio::test]
async fn test_resolve_full_configuration() {
    let aws = MockAwsProvider::new()
        .with_stack("us-east-1", quilt_stack(), vec![])
        .with_secret(
            "us-east-1",
            SECRET_NAME,
            secret(r#"{"client_id":"id","client_secret":"shh","tenant":"acme","app_definition_id":"appdef_1"}"#),
        );
    let resolver = ConfigResolver::new(aws);

    let config = resolver.resolve(STACK_ARN, SECRET_NAME).await.unwrap();
    assert_eq!(config.aws_region, "us-east-1");
    assert_eq!(config.aws_account, "123456789012");
    assert_eq!(config.quilt_database, "quilt_test_db");
    assert_eq!(config.quilt_user_bucket, "test-user-bucket");
    assert_eq!(config.quilt_catalog, "test.quilt.com");
    assert_eq!(
        config.queue_url,
        "https://sqs.us-east-1.amazonaws.com/123456789012/test-queue"
    );
    assert_eq!(config.pkg_prefix, "benchling");
    assert_eq!(config.pkg_key, "experiment_id");
    assert_eq!(config.log_level, "INFO");
    assert!(config.enable_webhook_verification);
    assert_eq!(config.benchling_app_definition_id.as_deref(), Some("appdef_1"));

    let json = serde_json::to_value(&*config).unwrap();
    assert!(json.get("benchlingClientSecret").is_none());
    assert_eq!(json["quiltDatabase"], "quilt_test_db");
    assert!(!format!("{:?}", config).contains("shh"));
}

#[tokio::test]
async fn test_secret_optional_fields_override_defaults() {
    let aws = MockAwsProvider::new()
        .with_stack("us-east-1", quilt_stack(), vec![])
        .with_secret(
            "us-west-2",
            "custom",
            secret(
                r#"{"client_id":"id","client_secret":"shh","tenant":"acme",
                    "pkg_prefix":"lab","log_level":"DEBUG","enable_webhook_verification":"false"}"#,
            ),
        );
    let resolver = ConfigResolver::new(aws);

    // The secret lives in a different region than the stack.
    let arn = "arn:aws:secretsmanager:us-west-2:123456789012:secret:custom-AbCdEf";
    let config = resolver.resolve(STACK_ARN, arn).await.unwrap();
    assert_eq!(config.pkg_prefix, "lab");
    assert_eq!(config.log_level, "DEBUG");
    assert!(!config.enable_webhook_verification);
}

#[tokio::test]
async fn test_boolean_verification_flag_in_secret() {
    let aws = MockAwsProvider::new()
        .with_stack("us-east-1", quilt_stack(), vec![])
        .with_secret(
            "us-east-1",
            SECRET_NAME,
            secret(
                r#"{"client_id":"id","client_secret":"shh","tenant":"acme","enable_webhook_verification":false}"#,
            ),
        );
    let resolver = ConfigResolver::new(aws);

    let config = resolver.resolve(STACK_ARN, SECRET_NAME).await.unwrap();
    assert!(!config.enable_webhook_verification);
    assert_eq!(config.benchling_tenant, "acme");
}

#[tokio::test]
async fn test_stack_not_found_and_invalid_arn() {
    let resolver = ConfigResolver::new(MockAwsProvider::new());

    let err = resolver.resolve(STACK_ARN, SECRET_NAME).await.unwrap_err();
    assert!(matches!(err, ResolveError::StackNotFound { .. }));
    assert_eq!(err.code(), ErrorCode::E002StackNotFound);
    assert!(err.remediation().contains("us-east-1"));

    let err = resolver
        .resolve("arn:aws:cloudformation:us-east-1:12345:stack/Q/x", SECRET_NAME)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::E001InvalidArn);
}

#[tokio::test]
async fn test_malformed_secret_reports_missing_fields() {
    let aws = MockAwsProvider::new()
        .with_stack("us-east-1", quilt_stack(), vec![])
        .with_secret("us-east-1", SECRET_NAME, secret(r#"{"client_id":"id"}"#));
    let resolver = ConfigResolver::new(aws);

    let err = resolver.resolve(STACK_ARN, SECRET_NAME).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::E005MalformedSecret);
    let message = err.to_string();
    assert!(message.contains("client_secret"));
    assert!(message.contains("tenant"));
}
