//! once-again - result cache maintenance
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use once_again::cli::{Cli, Commands};
use once_again::config::{Config, ConfigManager};
use once_again::error::{OnceAgainError, OnceAgainResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> OnceAgainResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions(args) = cli.command {
        return once_again::cli::commands::completions(args).await;
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| OnceAgainError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let mut config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;
    if let Some(root) = cli.root.clone() {
        config.cache.root = root;
    }

    init_logging(cli.verbose, &config);
    if let Some(ref path) = local_config_path {
        debug!("Applied local config {}", path.display());
    }
    debug!("Cache root: {}", config.cache.root.display());

    match cli.command {
        Commands::Completions(_) => unreachable!("Completions handled above"),
        Commands::List(args) => once_again::cli::commands::list(args, &config).await,
        Commands::Show(args) => once_again::cli::commands::show(args, &config).await,
        Commands::Clear(args) => once_again::cli::commands::clear(args, &config).await,
        Commands::Gc(args) => once_again::cli::commands::gc(args, &config).await,
        Commands::Config(args) => {
            once_again::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `general.verbose` raises 0 to info
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        0 if config.general.verbose => "info",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::new(format!("once_again={}", level));

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
}
