// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Conclave CLI
//!
//! The `conclave` binary manages swarm configuration manifests and runs
//! local swarm simulations against a synthetic executor.
//!
//! ## Commands
//!
//! - `conclave config show|validate|generate` - Configuration management
//! - `conclave simulate` - Spawn a roster, run a task batch, put a decision to a vote

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use conclave::commands::{self, ConfigCommand, SimulateArgs};
use conclave_core::domain::swarm_config::{LogFormat, SwarmConfigManifest};

/// Conclave - multi-agent swarm coordination
#[derive(Parser)]
#[command(name = "conclave")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CONCLAVE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Defaults to the manifest's setting
    #[arg(long, global = true, env = "CONCLAVE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format. Defaults to the manifest's setting
    #[arg(long, global = true, env = "CONCLAVE_LOG_FORMAT", value_enum)]
    log_format: Option<LogOutput>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogOutput {
    Text,
    Json,
}

impl From<LogFormat> for LogOutput {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => Self::Text,
            LogFormat::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Run a local swarm simulation
    #[command(name = "simulate")]
    Simulate {
        #[command(flatten)]
        args: SimulateArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Flags win over the manifest's observability.logging section
    let logging = SwarmConfigManifest::load_or_default(cli.config.clone())
        .map(|m| m.spec.observability.logging)
        .unwrap_or_default();
    let level = cli.log_level.clone().unwrap_or(logging.level);
    let format = cli.log_format.unwrap_or_else(|| logging.format.into());
    init_logging(&level, format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Simulate { args }) => commands::simulate::run(args, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogOutput) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogOutput::Text => builder.compact().init(),
        LogOutput::Json => builder.json().init(),
    }

    Ok(())
}
