use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vms_config::VmsConfig;

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands, SyncArgs};

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("vmsync error: {error:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let config =
        VmsConfig::load_with_dotenv(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.log.level, cli.quiet, cli.verbose)?;

    match cli.command {
        None => commands::sync::handle(&SyncArgs::default(), config, cli.format).await,
        Some(Commands::Sync(args)) => commands::sync::handle(&args, config, cli.format).await,
        Some(Commands::List(args)) => {
            commands::list::handle(&args, &config, cli.format).await?;
            Ok(0)
        }
        Some(Commands::CheckConfig) => {
            commands::check_config::handle(&config, cli.format)?;
            Ok(0)
        }
    }
}

/// `VMSYNC_LOG` wins, then `--quiet`/`--verbose`, then the configured level.
fn init_tracing(configured: &str, quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        configured
    };

    let filter = EnvFilter::try_from_env("VMSYNC_LOG")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
