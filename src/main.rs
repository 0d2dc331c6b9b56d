use anyhow::{Context as _, Result};
use benchling_webhook::output::render_error;
use benchling_webhook::{init_tracing, Command, Context, LogFormat};
use benchling_webhook_config::EnvSnapshot;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Resolve, validate and synchronize Benchling webhook deployment configuration
#[derive(Parser)]
#[command(name = "benchling-webhook")]
#[command(version)]
#[command(about = "Resolve, validate and synchronize Benchling webhook deployment configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level or filter directive (default: RUST_LOG, then info)
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Profile store location (default: ~/.config/benchling-webhook)
    #[arg(long, value_name = "DIR", global = true)]
    config_root: Option<PathBuf>,

    /// Named AWS profile for credentials
    #[arg(long, value_name = "NAME", global = true)]
    aws_profile: Option<String>,

    /// AWS region (default: AWS_REGION, then the AWS profile's region)
    #[arg(long, global = true)]
    region: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_format);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context::new(
        EnvSnapshot::capture(),
        cli.config_root,
        cli.aws_profile,
        cli.region,
    );

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(cli.command.run(&ctx))
}
