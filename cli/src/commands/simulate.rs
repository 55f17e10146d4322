// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `conclave simulate`: spawn a roster, run a synthetic batch in dependency
//! tiers, then put the batch up for a weighted vote among the agents.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use conclave_core::domain::agent::{AgentConfig, AgentId};
use conclave_core::domain::consensus::{ConsensusResult, Vote};
use conclave_core::domain::metrics::AgentHealth;
use conclave_core::domain::swarm_config::SwarmConfigManifest;
use conclave_core::domain::topology::SwarmTopology;
use conclave_core::infrastructure::event_bus::EventBusError;
use conclave_swarm::{BatchOutcome, SwarmCoordinator};

use crate::simulation::{parse_roster, synthetic_tasks, SimulatedExecutor};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Roster as `type=count` pairs
    #[arg(long, default_value = "coder=3,reviewer=2")]
    agents: String,

    /// Number of synthetic tasks
    #[arg(long, default_value_t = 20)]
    tasks: usize,

    /// Probability that any single execution fails
    #[arg(long, default_value_t = 0.1)]
    fail_rate: f64,

    /// Topology (overrides the manifest)
    #[arg(long)]
    topology: Option<SwarmTopology>,

    /// Upper bound of simulated execution latency
    #[arg(long, default_value_t = 50)]
    max_latency_ms: u64,

    /// Seed for task generation and the executor
    #[arg(long)]
    seed: Option<u64>,

    /// Serve Prometheus metrics on this port while the simulation runs
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Print the final swarm state as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: SimulateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut manifest =
        SwarmConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    if let Some(topology) = args.topology {
        manifest.spec.topology = topology;
    }
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let metrics_port = args.metrics_port.or_else(|| {
        let metrics = &manifest.spec.observability.metrics;
        metrics.enabled.then_some(metrics.port)
    });
    if let Some(port) = metrics_port {
        install_metrics_exporter(port)?;
    }

    let roster = parse_roster(&args.agents)?;
    let executor = Arc::new(SimulatedExecutor::new(
        args.fail_rate,
        Duration::from_millis(args.max_latency_ms),
        args.seed,
    ));
    let swarm = SwarmCoordinator::from_manifest(&manifest, executor);

    let mut events = swarm.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(event = event.name(), "Swarm event"),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });

    info!(
        swarm = %manifest.metadata.name,
        topology = %manifest.spec.topology,
        "Starting simulation"
    );

    if manifest.spec.topology == SwarmTopology::Hierarchical {
        swarm
            .spawn_agent(AgentConfig::new("coordinator").with_id("coordinator-0").leader())
            .await?;
    }
    for entry in &roster {
        for i in 0..entry.count {
            let id = format!("{}-{}", entry.agent_type, i);
            swarm
                .spawn_agent(AgentConfig::new(entry.agent_type.clone()).with_id(id))
                .await?;
        }
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let tasks = synthetic_tasks(&roster, args.tasks, &mut rng);
    let outcome = swarm.execute_in_dependency_tiers(&tasks).await?;
    print_outcome(&outcome);
    print_agents(&swarm);

    let verdict = put_to_vote(&swarm, &manifest, &outcome).await?;
    print_verdict(&verdict);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&swarm.get_swarm_state())?);
    }

    swarm.shutdown().await;
    event_log.abort();
    Ok(())
}

fn install_metrics_exporter(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// Every agent votes on whether to ship the batch: healthy agents approve,
/// anyone else rejects. Quorum is capped at the number of voters.
async fn put_to_vote(
    swarm: &SwarmCoordinator,
    manifest: &SwarmConfigManifest,
    outcome: &BatchOutcome,
) -> Result<ConsensusResult> {
    let voters: Vec<AgentId> = swarm.list_agents().into_iter().map(|a| a.id).collect();
    let mut config = manifest.spec.consensus.clone();
    config.quorum_size = config.quorum_size.min(voters.len()).max(1);

    let engine = swarm.convene(&voters, Some(config))?;
    let proposal = engine.propose(json!({
        "action": "ship",
        "completed": outcome.completed(),
        "failed": outcome.failed(),
        "unassigned": outcome.unassigned.len(),
    }));

    for voter in &voters {
        let vote = match swarm.get_agent_metrics(voter) {
            Some(m) if m.health == AgentHealth::Healthy => Vote::approve(voter.clone()),
            Some(m) => Vote::reject(voter.clone()).with_reason(format!("agent is {:?}", m.health)),
            None => Vote::abstain(voter.clone()),
        };
        if let Err(e) = engine.vote(&proposal, vote) {
            // Override or quorum already closed the proposal
            debug!(voter = %voter, error = %e, "Vote not recorded");
            break;
        }
    }

    let result = engine.await_consensus(&proposal).await?;
    if result.is_expired() {
        warn!(proposal_id = %result.proposal_id, "Ship proposal expired without a decision");
    }
    Ok(result)
}

fn print_outcome(outcome: &BatchOutcome) {
    println!("{}", "Batch outcome:".bold());
    println!("  Completed: {}", outcome.completed().to_string().green());
    println!("  Failed: {}", outcome.failed().to_string().red());
    println!("  Unassigned: {}", outcome.unassigned.len().to_string().yellow());
    println!();
}

fn print_agents(swarm: &SwarmCoordinator) {
    println!("{}", "Agents:".bold());
    for agent in swarm.list_agents() {
        let Some(metrics) = swarm.get_agent_metrics(&agent.id) else {
            continue;
        };
        let health = match metrics.health {
            AgentHealth::Healthy => "healthy".green(),
            AgentHealth::Degraded => "degraded".yellow(),
            AgentHealth::Unhealthy => "unhealthy".red(),
        };
        println!(
            "  {} ({}) {} ok / {} failed, {:.0}% success, avg {:.1}ms [{}]",
            agent.id.to_string().bold(),
            agent.agent_type,
            metrics.tasks_completed,
            metrics.tasks_failed,
            metrics.success_rate * 100.0,
            metrics.average_execution_time_ms,
            health
        );
    }
    println!();
}

fn print_verdict(result: &ConsensusResult) {
    println!("{}", "Ship vote:".bold());
    let status = if result.approved {
        result.status.to_string().green()
    } else {
        result.status.to_string().red()
    };
    println!("  Status: {}", status);
    println!("  Approval: {:.0}%", result.approval_ratio * 100.0);
    println!("  Participation: {:.0}%", result.participation_ratio * 100.0);
    if let Some(path) = &result.resolution {
        println!("  Resolved by: {:?}", path);
    }
    println!();
}
