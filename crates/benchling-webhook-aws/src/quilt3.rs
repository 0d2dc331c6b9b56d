//! Catalog discovery through the locally configured `quilt3` CLI

use crate::error::Result;
use crate::http::HttpClient;
use crate::provider::AwsProvider;
use crate::stack::StackOutputResolver;
use benchling_webhook_config::InferenceResult;
use tokio::process::Command;
use tracing::{debug, info, instrument};

pub const SOURCE_QUILT3: &str = "quilt3-cli+cloudformation";
pub const SOURCE_CLOUDFORMATION: &str = "cloudformation";

#[derive(Debug, Clone)]
pub struct Quilt3Cli {
    program: String,
}

impl Default for Quilt3Cli {
    fn default() -> Self {
        Self::new("quilt3")
    }
}

impl Quilt3Cli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Navigator URL from `quilt3 config`, or `None` when the CLI is absent,
    /// fails, or has no catalog configured.
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn configured_catalog(&self) -> Option<String> {
        let output = match Command::new(&self.program).arg("config").output().await {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "quilt3 not available");
                return None;
            }
        };
        if !output.status.success() {
            debug!(status = %output.status, "quilt3 config failed");
            return None;
        }
        parse_config_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Last line of `quilt3 config` output that is an http(s) URL.
pub fn parse_config_output(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("https://") || line.starts_with("http://"))
        .last()
        .map(|line| line.trim_end_matches('/').to_string())
}

/// Discover the stack behind `catalog`, asking quilt3 when no catalog is given.
///
/// Returns `Ok(None)` when neither a catalog nor a quilt3 configuration exists.
pub async fn infer_quilt_config<H: HttpClient, P: AwsProvider>(
    resolver: &StackOutputResolver<H, P>,
    catalog: Option<&str>,
    quilt3: &Quilt3Cli,
) -> Result<Option<InferenceResult>> {
    let (catalog, source) = match catalog.map(str::trim).filter(|c| !c.is_empty()) {
        Some(catalog) => (catalog.to_string(), SOURCE_CLOUDFORMATION),
        None => match quilt3.configured_catalog().await {
            Some(catalog) => {
                info!(catalog = %catalog, "Using catalog from quilt3 config");
                (catalog, SOURCE_QUILT3)
            }
            None => return Ok(None),
        },
    };

    let inference = resolver.infer(&catalog).await?;
    Ok(Some(inference.to_inference_result(source)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAwsProvider, MockHttpClient};

    #[test]
    fn test_parse_config_output() {
        assert_eq!(
            parse_config_output("https://quilt.example.com/\n").as_deref(),
            Some("https://quilt.example.com")
        );
        assert_eq!(
            parse_config_output("navigator_url:\nhttps://a.example.com\n").as_deref(),
            Some("https://a.example.com")
        );
        assert_eq!(parse_config_output("<None>\n"), None);
        assert_eq!(parse_config_output(""), None);
    }

    #[tokio::test]
    async fn test_missing_cli_is_none() {
        let cli = Quilt3Cli::new("definitely-not-a-real-quilt3-binary");
        assert_eq!(cli.configured_catalog().await, None);

        let resolver = StackOutputResolver::new(MockHttpClient::new(), MockAwsProvider::new());
        assert!(infer_quilt_config(&resolver, None, &cli).await.unwrap().is_none());
    }
}
