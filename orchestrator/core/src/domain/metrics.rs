// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Per-Agent Metrics
//!
//! Running statistics the coordinator records after every execution.
//!
//! ## Health Classification
//! | Condition | Health |
//! |-----------|--------|
//! | no executions yet | `Healthy` |
//! | success rate < `unhealthy_success_rate`, or consecutive failures ≥ `unhealthy_consecutive_failures` | `Unhealthy` |
//! | success rate < `degraded_success_rate`, or consecutive failures ≥ `degraded_consecutive_failures` | `Degraded` |
//! | otherwise | `Healthy` |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    #[serde(default = "default_degraded_success_rate")]
    pub degraded_success_rate: f64,

    #[serde(default = "default_unhealthy_success_rate")]
    pub unhealthy_success_rate: f64,

    #[serde(default = "default_degraded_consecutive_failures")]
    pub degraded_consecutive_failures: u32,

    #[serde(default = "default_unhealthy_consecutive_failures")]
    pub unhealthy_consecutive_failures: u32,
}

fn default_degraded_success_rate() -> f64 {
    0.8
}

fn default_unhealthy_success_rate() -> f64 {
    0.5
}

fn default_degraded_consecutive_failures() -> u32 {
    2
}

fn default_unhealthy_consecutive_failures() -> u32 {
    3
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_success_rate: default_degraded_success_rate(),
            unhealthy_success_rate: default_unhealthy_success_rate(),
            degraded_consecutive_failures: default_degraded_consecutive_failures(),
            unhealthy_consecutive_failures: default_unhealthy_consecutive_failures(),
        }
    }
}

impl HealthThresholds {
    pub fn classify(&self, metrics: &AgentMetrics) -> AgentHealth {
        if metrics.total() == 0 {
            return AgentHealth::Healthy;
        }
        if metrics.success_rate < self.unhealthy_success_rate
            || metrics.consecutive_failures >= self.unhealthy_consecutive_failures
        {
            AgentHealth::Unhealthy
        } else if metrics.success_rate < self.degraded_success_rate
            || metrics.consecutive_failures >= self.degraded_consecutive_failures
        {
            AgentHealth::Degraded
        } else {
            AgentHealth::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub agent_id: AgentId,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Running mean over every recorded execution, in milliseconds
    pub average_execution_time_ms: f64,
    /// `tasks_completed / total`; 1.0 before the first execution
    pub success_rate: f64,
    pub health: AgentHealth,
    pub consecutive_failures: u32,
    pub last_updated: DateTime<Utc>,
}

impl AgentMetrics {
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            tasks_completed: 0,
            tasks_failed: 0,
            average_execution_time_ms: 0.0,
            success_rate: 1.0,
            health: AgentHealth::Healthy,
            consecutive_failures: 0,
            last_updated: Utc::now(),
        }
    }

    pub fn total(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }

    /// Fold one execution into the record: `avg' = (avg * (n - 1) + new) / n`.
    fn record(&mut self, succeeded: bool, duration: Duration) {
        if succeeded {
            self.tasks_completed += 1;
            self.consecutive_failures = 0;
        } else {
            self.tasks_failed += 1;
            self.consecutive_failures += 1;
        }

        let n = self.total() as f64;
        let sample = duration.as_nanos() as f64 / 1_000_000.0;
        self.average_execution_time_ms = (self.average_execution_time_ms * (n - 1.0) + sample) / n;
        self.success_rate = self.tasks_completed as f64 / n;
        self.last_updated = Utc::now();
    }
}

/// Health transition produced by a metrics update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChange {
    pub from: AgentHealth,
    pub to: AgentHealth,
}

/// One [`AgentMetrics`] record per registered agent.
#[derive(Debug, Clone, Default)]
pub struct MetricsTracker {
    records: HashMap<AgentId, AgentMetrics>,
    thresholds: HealthThresholds,
}

impl MetricsTracker {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self {
            records: HashMap::new(),
            thresholds,
        }
    }

    /// Zeroed, healthy record. Replaces any stale record for the same id.
    pub fn register(&mut self, agent_id: AgentId) {
        self.records.insert(agent_id.clone(), AgentMetrics::new(agent_id));
    }

    pub fn remove(&mut self, agent_id: &AgentId) -> Option<AgentMetrics> {
        self.records.remove(agent_id)
    }

    /// Record one execution. Unknown agents are ignored and yield `None`.
    pub fn record(&mut self, agent_id: &AgentId, succeeded: bool, duration: Duration) -> Option<HealthChange> {
        let metrics = self.records.get_mut(agent_id)?;
        let before = metrics.health;
        metrics.record(succeeded, duration);
        metrics.health = self.thresholds.classify(metrics);

        (before != metrics.health).then_some(HealthChange {
            from: before,
            to: metrics.health,
        })
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<&AgentMetrics> {
        self.records.get(agent_id)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
