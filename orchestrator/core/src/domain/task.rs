// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Model
//!
//! Units of work submitted to the swarm plus the static ordering helpers the
//! coordinator relies on:
//!
//! - [`sort_by_priority`]: stable high → low ordering used before distribution.
//! - [`resolve_execution_order`]: topological sort over declared dependencies.
//! - [`dependency_tiers`]: the same graph grouped into batches that may run
//!   concurrently.
//!
//! A dependency cycle fails the whole resolution; no partial order is ever
//! returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::domain::agent::AgentId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Ordered priority tier. `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Assigned,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Matched against agent capabilities
    #[serde(rename = "type")]
    pub task_type: String,

    #[serde(default)]
    pub priority: TaskPriority,

    /// Tasks that must complete before this one may be scheduled
    #[serde(default)]
    pub dependencies: Vec<TaskId>,

    /// Opaque, executor-defined input
    #[serde(default)]
    pub payload: serde_json::Value,

    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            priority: TaskPriority::Medium,
            dependencies: Vec::new(),
            payload: serde_json::Value::Null,
            status: TaskStatus::Pending,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<TaskId>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Immutable record produced by one distribution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub assigned_at: DateTime<Utc>,
    pub priority: TaskPriority,
}

/// Outcome of one execution. Failures are data, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    /// Executing agent; `None` when the task never reached one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// `Completed` or `Failed`
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn completed(task_id: TaskId, agent_id: AgentId, output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            task_id,
            agent_id: Some(agent_id),
            status: TaskStatus::Completed,
            output: Some(output),
            error: None,
            duration_ms,
        }
    }

    pub fn failed(task_id: TaskId, agent_id: AgentId, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id,
            agent_id: Some(agent_id),
            status: TaskStatus::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// Failure for a task that was never handed to an agent.
    pub fn skipped(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self {
            task_id,
            agent_id: None,
            status: TaskStatus::Failed,
            output: None,
            error: Some(reason.into()),
            duration_ms: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Structural problems in a task batch. Always fatal to the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskGraphError {
    #[error("Cyclic task dependency among: {}", join_ids(.tasks))]
    CyclicDependency { tasks: Vec<TaskId> },

    #[error("Task {task} depends on unknown task {dependency}")]
    MissingDependency { task: TaskId, dependency: TaskId },

    #[error("Duplicate task id {0}")]
    DuplicateTask(TaskId),
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(", ")
}

/// Stable sort, highest priority first. Order within a tier is preserved.
pub fn sort_by_priority(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Adjacency view over a validated batch.
struct DependencyGraph {
    in_degree: Vec<usize>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    fn build(tasks: &[Task]) -> Result<Self, TaskGraphError> {
        let mut index: HashMap<&TaskId, usize> = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(&task.id, i).is_some() {
                return Err(TaskGraphError::DuplicateTask(task.id.clone()));
            }
        }

        let mut in_degree = vec![0; tasks.len()];
        let mut dependents = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            let mut seen = HashSet::new();
            for dependency in &task.dependencies {
                let &j = index.get(dependency).ok_or_else(|| TaskGraphError::MissingDependency {
                    task: task.id.clone(),
                    dependency: dependency.clone(),
                })?;
                if seen.insert(j) {
                    in_degree[i] += 1;
                    dependents[j].push(i);
                }
            }
        }

        Ok(Self { in_degree, dependents })
    }

    fn cycle_error(&self, tasks: &[Task]) -> TaskGraphError {
        TaskGraphError::CyclicDependency {
            tasks: tasks
                .iter()
                .zip(&self.in_degree)
                .filter(|&(_, &d)| d > 0)
                .map(|(t, _)| t.id.clone())
                .collect(),
        }
    }
}

/// Topological order over the batch. Among tasks that are ready at the same
/// time, earlier input position wins.
pub fn resolve_execution_order(tasks: &[Task]) -> Result<Vec<Task>, TaskGraphError> {
    let mut graph = DependencyGraph::build(tasks)?;

    let mut ready: BTreeSet<usize> = (0..tasks.len()).filter(|&i| graph.in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(tasks.len());

    while let Some(i) = ready.pop_first() {
        order.push(tasks[i].clone());
        for k in 0..graph.dependents[i].len() {
            let dependent = graph.dependents[i][k];
            graph.in_degree[dependent] -= 1;
            if graph.in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < tasks.len() {
        return Err(graph.cycle_error(tasks));
    }
    Ok(order)
}

/// Group the batch into tiers: every task's dependencies live in strictly
/// earlier tiers. Tasks keep input order within a tier.
pub fn dependency_tiers(tasks: &[Task]) -> Result<Vec<Vec<Task>>, TaskGraphError> {
    let mut graph = DependencyGraph::build(tasks)?;

    let mut current: Vec<usize> = (0..tasks.len()).filter(|&i| graph.in_degree[i] == 0).collect();
    let mut tiers = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for k in 0..graph.dependents[i].len() {
                let dependent = graph.dependents[i][k];
                graph.in_degree[dependent] -= 1;
                if graph.in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        placed += current.len();
        tiers.push(current.iter().map(|&i| tasks[i].clone()).collect());
        next.sort_unstable();
        current = next;
    }

    if placed < tasks.len() {
        return Err(graph.cycle_error(tasks));
    }
    Ok(tiers)
}
