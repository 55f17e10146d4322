// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::agent::Agent;
use crate::domain::task::Task;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Task execution failed: {0}")]
    Failed(String),
    #[error("Task execution cancelled")]
    Cancelled,
    #[error("Task executor panicked: {0}")]
    Panicked(String),
}

/// Performs the caller-defined work behind a task. The coordinator imposes no
/// timeout; wrap the executor if one is needed.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<serde_json::Value, ExecutionError>;
}
