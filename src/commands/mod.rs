//! Subcommands and the state they share

mod deployment;
mod infer;
mod init;
mod profile;
mod resolve;
mod stack_config;
mod sync;
mod validate;

use anyhow::Result;
use benchling_webhook_aws::{ReqwestHttpClient, SdkAwsProvider, StackOutputResolver};
use benchling_webhook_config::{EnvSnapshot, EnvSource, ProfileStore};
use clap::Subcommand;
use std::path::PathBuf;

pub use deployment::RecordDeploymentArgs;
pub use infer::InferArgs;
pub use init::InitArgs;
pub use profile::ProfileCommand;
pub use resolve::ResolveArgs;
pub use stack_config::StackConfigArgs;
pub use sync::SyncArgs;
pub use validate::ValidateArgs;

#[derive(Subcommand)]
pub enum Command {
    /// Create or update a profile interactively
    Init(InitArgs),
    /// Discover the Quilt stack behind a catalog
    Infer(InferArgs),
    /// Resolve runtime configuration from a stack ARN and secret
    Resolve(ResolveArgs),
    /// Check CLI, environment and dotenv configuration for deployment
    Validate(ValidateArgs),
    /// Create or update the Benchling secret for one or more profiles
    SyncSecrets(SyncArgs),
    /// Print the deployment parameters derived from a profile
    StackConfig(StackConfigArgs),
    /// Inspect and manage stored profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Record a completed deployment for a profile
    RecordDeployment(RecordDeploymentArgs),
}

impl Command {
    pub async fn run(self, ctx: &Context) -> Result<()> {
        match self {
            Command::Init(args) => init::run(ctx, args).await,
            Command::Infer(args) => infer::run(ctx, args).await,
            Command::Resolve(args) => resolve::run(ctx, args).await,
            Command::Validate(args) => validate::run(ctx, args).await,
            Command::SyncSecrets(args) => sync::run(ctx, args).await,
            Command::StackConfig(args) => stack_config::run(ctx, args),
            Command::Profile(command) => profile::run(ctx, command),
            Command::RecordDeployment(args) => deployment::run(ctx, args),
        }
    }
}

/// Environment, profile store and AWS selection for one invocation
pub struct Context {
    pub env: EnvSnapshot,
    pub store: ProfileStore,
    pub aws_profile: Option<String>,
    pub region: Option<String>,
}

impl Context {
    pub fn new(
        env: EnvSnapshot,
        config_root: Option<PathBuf>,
        aws_profile: Option<String>,
        region: Option<String>,
    ) -> Self {
        let store = match config_root {
            Some(root) => ProfileStore::new(root),
            None => ProfileStore::from_env(&env),
        };
        Self {
            env,
            store,
            aws_profile,
            region,
        }
    }

    /// Region from `--region`, else the usual AWS environment variables.
    pub fn region(&self) -> Option<String> {
        self.region
            .clone()
            .or_else(|| self.env.get("AWS_REGION"))
            .or_else(|| self.env.get("AWS_DEFAULT_REGION"))
    }

    pub async fn aws(&self) -> SdkAwsProvider {
        SdkAwsProvider::load(self.aws_profile.as_deref(), self.region().as_deref()).await
    }

    pub async fn stack_resolver(
        &self,
    ) -> Result<StackOutputResolver<ReqwestHttpClient, SdkAwsProvider>> {
        Ok(StackOutputResolver::new(
            ReqwestHttpClient::new()?,
            self.aws().await,
        ))
    }
}
