// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use conclave_core::domain::swarm_config::SwarmConfigManifest;

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the resolved manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./conclave-config.yaml)
        #[arg(short, long, default_value = "./conclave-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = SwarmConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CONCLAVE_CONFIG_PATH: {}",
            std::env::var("CONCLAVE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./conclave-config.yaml");
        println!("  4. ~/.conclave/config.yaml");
        println!("  5. /etc/conclave/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Swarm:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!("  Topology: {}", config.spec.topology);
    println!("  Event bus capacity: {}", config.spec.event_bus.capacity);
    println!();

    let execution = &config.spec.execution;
    println!("{}", "Execution:".bold());
    println!(
        "  Max concurrency: {}",
        execution
            .max_concurrency
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(unbounded)".to_string())
    );
    println!(
        "  Cancel in-flight on terminate: {}",
        execution.cancel_in_flight_on_terminate
    );
    println!();

    let health = &config.spec.health;
    println!("{}", "Health thresholds:".bold());
    println!(
        "  Degraded: success rate < {} or {} consecutive failures",
        health.degraded_success_rate, health.degraded_consecutive_failures
    );
    println!(
        "  Unhealthy: success rate < {} or {} consecutive failures",
        health.unhealthy_success_rate, health.unhealthy_consecutive_failures
    );
    println!();

    let consensus = &config.spec.consensus;
    println!("{}", "Consensus:".bold());
    println!("  Quorum: {}", consensus.quorum_size);
    println!("  Approval threshold: {}", consensus.approval_threshold);
    println!("  Tie breaker: {:?}", consensus.tie_breaker);
    if let Some(affinity) = &consensus.affinity {
        println!("  Affinity: {} (x{})", affinity, consensus.affinity_multiplier);
    }
    if let Some(voter) = consensus.override_authority() {
        println!("  Override voter: {}", voter);
    }
    println!("  Vote timeout: {}ms", consensus.vote_timeout_ms);
    println!();

    let observability = &config.spec.observability;
    println!("{}", "Observability:".bold());
    println!(
        "  Logging: {} ({:?})",
        observability.logging.level, observability.logging.format
    );
    if observability.metrics.enabled {
        println!("  Metrics: enabled on port {}", observability.metrics.port);
    } else {
        println!("  Metrics: {}", "disabled".dimmed());
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = SwarmConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
