//! Rill - item pipelines over newline-delimited JSON
//!
//! # Usage
//!
//! ```bash
//! # Print every object from a file
//! rill collect --input events.jsonl
//!
//! # Bucket objects by a field, keeping first-seen key order
//! cat events.jsonl | rill group-by country
//!
//! # Sum a numeric field over matching objects
//! rill sum age --filter country=BR --input people.jsonl
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rill_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Rill - item pipelines over newline-delimited JSON
#[derive(Parser, Debug)]
#[command(name = "rill")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Read JSON lines from this file instead of stdin
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print matching objects, one per line
    Collect(cmd::collect::CollectArgs),

    /// Print matching objects grouped by a field
    GroupBy(cmd::group_by::GroupByArgs),

    /// Print the sum of a numeric field over matching objects
    Sum(cmd::sum::SumArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, config.log.format)?;

    let source = cmd::input::spawn_reader(cli.input, config.pipeline.source_capacity);

    match cli.command {
        Command::Collect(args) => cmd::collect::run(args, &config, source).await,
        Command::GroupBy(args) => cmd::group_by::run(args, &config, source).await,
        Command::Sum(args) => cmd::sum::run(args, &config, source).await,
    }
}

/// Load the config file if one was given, defaults otherwise
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Resolve the log filter: CLI flag > config file > default "info" for rill
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.filter_directive(),
    }
}

/// Initialize the tracing subscriber, writing to stderr
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (console, json) = match format {
        LogFormat::Console => (
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(json)
        .with(filter)
        .init();

    Ok(())
}
