// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Synthetic workload for `conclave simulate`: a roster parser, a task
//! generator and an executor that sleeps and fails at random.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use conclave_core::domain::agent::{default_capabilities, Agent};
use conclave_core::domain::runtime::{ExecutionError, TaskExecutor};
use conclave_core::domain::task::{Task, TaskPriority};

/// One `type=count` entry of a roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub agent_type: String,
    pub count: usize,
}

/// Parse `coder=3,reviewer=2`. A bare type counts as one agent.
pub fn parse_roster(roster: &str) -> Result<Vec<RosterEntry>> {
    let mut entries = Vec::new();
    for part in roster.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (agent_type, count) = match part.split_once('=') {
            Some((agent_type, count)) => {
                let count = count
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid agent count in '{}'", part))?;
                (agent_type.trim(), count)
            }
            None => (part, 1),
        };
        if agent_type.is_empty() {
            bail!("Missing agent type in '{}'", part);
        }
        entries.push(RosterEntry {
            agent_type: agent_type.to_string(),
            count,
        });
    }

    if entries.iter().all(|e| e.count == 0) {
        bail!("Roster '{}' spawns no agents", roster);
    }
    Ok(entries)
}

/// Generate `count` tasks whose types are drawn from the roster's default
/// capabilities. Dependencies only ever point at earlier tasks.
pub fn synthetic_tasks(roster: &[RosterEntry], count: usize, rng: &mut impl Rng) -> Vec<Task> {
    let task_types: Vec<&str> = roster
        .iter()
        .flat_map(|e| default_capabilities(&e.agent_type).iter().copied())
        .collect();
    if task_types.is_empty() {
        return Vec::new();
    }

    (0..count)
        .map(|i| {
            let task_type = task_types[rng.random_range(0..task_types.len())];
            let priority = match rng.random_range(0..3) {
                0 => TaskPriority::Low,
                1 => TaskPriority::Medium,
                _ => TaskPriority::High,
            };
            let mut task = Task::new(format!("task-{}", i), task_type).with_priority(priority);
            if i > 0 && rng.random_bool(0.2) {
                task = task.depends_on(format!("task-{}", rng.random_range(0..i)));
            }
            task
        })
        .collect()
}

/// Executor that sleeps up to `max_latency` and fails with `fail_rate` probability.
pub struct SimulatedExecutor {
    fail_rate: f64,
    max_latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(fail_rate: f64, max_latency: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            fail_rate: fail_rate.clamp(0.0, 1.0),
            max_latency,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<serde_json::Value, ExecutionError> {
        let (latency, fails) = {
            let mut rng = self.rng.lock();
            let max_ms = self.max_latency.as_millis() as u64;
            let latency = Duration::from_millis(rng.random_range(0..=max_ms));
            (latency, rng.random_bool(self.fail_rate))
        };

        tokio::time::sleep(latency).await;
        if fails {
            return Err(ExecutionError::Failed(format!(
                "simulated failure in {} task",
                task.task_type
            )));
        }
        Ok(serde_json::json!({
            "agent": agent.id,
            "task": task.id,
            "latency_ms": latency.as_millis() as u64,
        }))
    }
}
