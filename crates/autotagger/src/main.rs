//! Autotagger CLI - tag images with ONNX tagger models.
//!
//! Results of every evaluation are cached per image content and model, and
//! filters (threshold, keep/exclude/add lists, search/replace) are applied
//! on replay, so tuning them never re-runs a model.
//!
//! # Usage
//!
//! ```bash
//! # Download the default tagger
//! autotagger models download
//!
//! # Tag a folder, writing one tags file per image
//! autotagger tag ./photos --output-dir ./tags --threshold 0.4
//!
//! # Machine-readable report
//! autotagger tag ./photos --output report.jsonl --format jsonl
//!
//! # Menu-driven session
//! autotagger
//! ```

use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;

mod cli;
mod logging;

/// Autotagger - tag images with ONNX tagger models.
#[derive(Parser, Debug)]
#[command(name = "autotagger")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "AUTOTAGGER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Tag images and write tags files and a report
    Tag(cli::tag::TagArgs),

    /// Download and list tagger models
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config_path = cli.config.clone().unwrap_or_else(autotagger_core::Config::default_path);
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config {}: {e}\n  \
                 Using default configuration. Check it with `autotagger config check`.",
                config_path.display()
            );
            autotagger_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Autotagger v{}", autotagger_core::VERSION);

    match cli.command {
        Some(Commands::Tag(args)) => cli::tag::execute(args, config).await,
        Some(Commands::Models(args)) => cli::models::execute(args, config).await,
        Some(Commands::Config(args)) => cli::config::execute(args, config_path).await,
        None if std::io::stdin().is_terminal() => {
            tokio::task::spawn_blocking(move || cli::interactive::run(config)).await?
        }
        None => {
            anyhow::bail!("No command given. Run `autotagger --help` for usage.");
        }
    }
}
