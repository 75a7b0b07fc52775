mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console_pipeline::config::ConsolePipelineConfig;
use runtime::{AppConfig, CliArgs};
use std::path::{Path, PathBuf};
use url::Url;

const MODULE_NAME: &str = "console_pipeline";

/// Console CLI - operator tool for the permission-gated mutation pipeline
#[derive(Parser)]
#[command(name = "console-cli")]
#[command(about = "Console CLI - operator tool for the permission-gated mutation pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check configuration
    Check,
    /// Run a YAML session script through the pipeline and print the audit log and notifications
    Replay {
        /// Path to the script
        script: PathBuf,

        /// Send mutations to the configured remote API instead of an in-memory store
        #[arg(long)]
        remote: bool,

        /// Bearer credential for the remote API
        #[arg(long, requires = "remote")]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.home_dir));
    tracing::info!("Console CLI starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let module_cfg: ConsolePipelineConfig = config.module_config(MODULE_NAME)?;

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => check_config(&config, &module_cfg),
        Commands::Replay {
            script,
            remote,
            token,
        } => {
            let mode = if remote {
                replay::Mode::Remote { token }
            } else {
                replay::Mode::InMemory
            };
            replay::run_file(&script, &module_cfg, mode).await
        }
    }
}

fn check_config(config: &AppConfig, module_cfg: &ConsolePipelineConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    Url::parse(&module_cfg.api_base_url)
        .with_context(|| format!("invalid api_base_url '{}'", module_cfg.api_base_url))?;
    if module_cfg.request_timeout_ms == 0 {
        anyhow::bail!("request_timeout_ms must be greater than zero");
    }

    tracing::info!("Configuration is valid");
    println!("Configuration check passed");
    println!("Application config:");
    println!("{}", config.to_yaml()?);
    println!("Pipeline config:");
    println!("{}", serde_yaml::to_string(module_cfg)?);

    Ok(())
}
