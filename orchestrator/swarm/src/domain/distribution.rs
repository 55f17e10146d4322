// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Distribution
//!
//! Greedy least-loaded assignment. Tasks are visited in priority order
//! (stable within a tier); each goes to the eligible agent with the lowest
//! assignment count so far in this pass, ties broken by registry order. An
//! agent is eligible when it is `Active` and declares the task type.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use conclave_core::domain::agent::{Agent, AgentId, AgentStatus};
use conclave_core::domain::task::{sort_by_priority, Task, TaskAssignment, TaskResult};

/// Result of one distribution pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Distribution {
    /// One per assigned task, in assignment order
    pub assignments: Vec<TaskAssignment>,
    /// Tasks no eligible agent could take
    pub unassigned: Vec<Task>,
}

/// Distribution with each assignment still paired to its task.
#[derive(Debug, Clone, Default)]
pub struct DistributionPlan {
    pub assigned: Vec<(Task, TaskAssignment)>,
    pub unassigned: Vec<Task>,
}

impl DistributionPlan {
    pub fn into_distribution(self) -> Distribution {
        Distribution {
            assignments: self.assigned.into_iter().map(|(_, a)| a).collect(),
            unassigned: self.unassigned,
        }
    }
}

pub fn plan_distribution(tasks: &[Task], agents: &[Agent]) -> DistributionPlan {
    let mut ordered = tasks.to_vec();
    sort_by_priority(&mut ordered);

    let mut load: HashMap<&AgentId, usize> = HashMap::new();
    let mut plan = DistributionPlan::default();

    for task in ordered {
        let mut best: Option<(&Agent, usize)> = None;
        for agent in agents
            .iter()
            .filter(|a| a.status == AgentStatus::Active && a.can_execute(&task.task_type))
        {
            let count = load.get(&agent.id).copied().unwrap_or(0);
            if best.map_or(true, |(_, c)| count < c) {
                best = Some((agent, count));
            }
        }

        match best {
            Some((agent, count)) => {
                load.insert(&agent.id, count + 1);
                let assignment = TaskAssignment {
                    task_id: task.id.clone(),
                    agent_id: agent.id.clone(),
                    assigned_at: Utc::now(),
                    priority: task.priority,
                };
                plan.assigned.push((task, assignment));
            }
            None => plan.unassigned.push(task),
        }
    }

    plan
}

/// Results of a concurrent batch plus whatever never reached an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<TaskResult>,
    pub unassigned: Vec<Task>,
}

impl BatchOutcome {
    pub fn completed(&self) -> usize {
        self.results.iter().filter(|r| r.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.completed()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleRequest {
    #[serde(rename = "type")]
    pub agent_type: String,
    /// Positive spawns, negative terminates oldest-first
    pub count: i64,
}

impl ScaleRequest {
    pub fn new(agent_type: impl Into<String>, count: i64) -> Self {
        Self {
            agent_type: agent_type.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScaleOutcome {
    pub spawned: Vec<AgentId>,
    pub terminated: Vec<AgentId>,
}
