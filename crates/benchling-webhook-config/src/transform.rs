//! Profile to StackConfig projection

use crate::error::{ConfigError, Result};
use crate::types::{Profile, StackBenchlingConfig, StackConfig, VpcConfig};
use std::net::Ipv4Addr;

/// Minimum private subnets for an existing VPC (one per AZ for the load balancer).
const MIN_PRIVATE_SUBNETS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub config: StackConfig,
    pub warnings: Vec<String>,
}

/// Project a profile onto the deployment-relevant fields, checking that the
/// stack can be synthesized from it. Packages, logging and metadata are dropped.
pub fn profile_to_stack_config(profile: &Profile) -> Result<TransformOutput> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let secret_arn = profile
        .benchling
        .secret_arn
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if secret_arn.is_none() {
        errors.push(
            "benchling.secretArn is required; run `benchling-webhook sync-secrets` to create the secret"
                .to_string(),
        );
    }

    let quilt = &profile.quilt;
    for (field, value) in [
        ("catalog", &quilt.catalog),
        ("database", &quilt.database),
        ("queueUrl", &quilt.queue_url),
        ("region", &quilt.region),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("quilt.{} is required", field));
        }
    }

    if quilt.write_role_arn.is_none() {
        warnings.push(
            "quilt.writeRoleArn is not set; package writes will use the webhook's own role"
                .to_string(),
        );
    }

    if let Some(vpc) = &profile.deployment.vpc {
        errors.extend(check_vpc(vpc));
    }

    if let Some(allow_list) = profile
        .security
        .as_ref()
        .and_then(|s| s.webhook_allow_list.as_deref())
    {
        errors.extend(
            invalid_cidrs(allow_list)
                .into_iter()
                .map(|entry| format!("security.webhookAllowList: invalid CIDR '{}'", entry)),
        );
    }

    if !errors.is_empty() {
        return Err(ConfigError::Invalid { errors });
    }

    let config = StackConfig {
        benchling: StackBenchlingConfig {
            secret_arn: secret_arn.unwrap_or_default().to_string(),
        },
        quilt: profile.quilt.clone(),
        deployment: profile.deployment.clone(),
        security: profile.security.clone(),
    };
    Ok(TransformOutput { config, warnings })
}

fn check_vpc(vpc: &VpcConfig) -> Vec<String> {
    let mut errors = Vec::new();
    // No vpcId: the stack creates its own VPC.
    if vpc.vpc_id.is_none() {
        return errors;
    }
    if vpc.private_subnet_ids.len() < MIN_PRIVATE_SUBNETS {
        errors.push(format!(
            "deployment.vpc: at least {} private subnets are required when vpcId is set (found {})",
            MIN_PRIVATE_SUBNETS,
            vpc.private_subnet_ids.len()
        ));
    }
    if vpc.availability_zones.is_empty() {
        errors.push(
            "deployment.vpc: availabilityZones are required when vpcId is set".to_string(),
        );
    }
    errors
}

/// Entries of a comma-separated IPv4 CIDR list that do not parse.
pub fn invalid_cidrs(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter(|entry| !is_valid_cidr(entry))
        .map(str::to_string)
        .collect()
}

fn is_valid_cidr(entry: &str) -> bool {
    let (addr, prefix) = match entry.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (entry, None),
    };
    if addr.parse::<Ipv4Addr>().is_err() {
        return false;
    }
    match prefix {
        None => true,
        Some(p) => p.parse::<u8>().is_ok_and(|bits| bits <= 32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_profile;
    use crate::types::SecurityConfig;

    #[test]
    fn test_projection_drops_packages_and_metadata() {
        let out = profile_to_stack_config(&sample_profile()).unwrap();
        let json = serde_json::to_value(&out.config).unwrap();
        assert!(json.get("packages").is_none());
        assert!(json.get("logging").is_none());
        assert!(json.get("_metadata").is_none());
        assert_eq!(
            json["benchling"],
            serde_json::json!({
                "secretArn": "arn:aws:secretsmanager:us-east-1:123456789012:secret:bw-AbCdEf"
            })
        );
    }

    #[test]
    fn test_missing_secret_arn_names_sync_command() {
        let mut profile = sample_profile();
        profile.benchling.secret_arn = None;
        let err = profile_to_stack_config(&profile).unwrap_err();
        assert!(err.to_string().contains("sync-secrets"));
    }

    #[test]
    fn test_all_missing_quilt_fields_reported() {
        let mut profile = sample_profile();
        profile.quilt.database.clear();
        profile.quilt.queue_url.clear();
        let ConfigError::Invalid { errors } = profile_to_stack_config(&profile).unwrap_err()
        else {
            panic!("expected Invalid");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("quilt.database"));
        assert!(errors[1].contains("quilt.queueUrl"));
    }

    #[test]
    fn test_missing_write_role_is_warning() {
        let out = profile_to_stack_config(&sample_profile()).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("writeRoleArn")));
    }

    #[test]
    fn test_incomplete_vpc_names_private_subnets() {
        let mut profile = sample_profile();
        profile.deployment.vpc = Some(VpcConfig {
            vpc_id: Some("vpc-123".to_string()),
            private_subnet_ids: vec!["subnet-a".to_string()],
            availability_zones: vec!["us-east-1a".to_string()],
            ..Default::default()
        });
        let err = profile_to_stack_config(&profile).unwrap_err();
        assert!(err.to_string().contains("private subnets"));
    }

    #[test]
    fn test_vpc_without_id_means_create() {
        let mut profile = sample_profile();
        profile.deployment.vpc = Some(VpcConfig::default());
        assert!(profile_to_stack_config(&profile).is_ok());
    }

    #[test]
    fn test_invalid_cidrs_named_individually() {
        let mut profile = sample_profile();
        profile.security = Some(SecurityConfig {
            enable_verification: Some(true),
            webhook_allow_list: Some("10.0.0.0/8, 300.1.1.1/32, 192.168.1.1, 1.2.3.4/33".to_string()),
        });
        let ConfigError::Invalid { errors } = profile_to_stack_config(&profile).unwrap_err()
        else {
            panic!("expected Invalid");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("300.1.1.1/32"));
        assert!(errors[1].contains("1.2.3.4/33"));
    }
}
