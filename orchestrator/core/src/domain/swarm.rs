// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::consensus::ConsensusError;
use crate::domain::metrics::AgentMetrics;
use crate::domain::task::TaskGraphError;
use crate::domain::topology::{MeshConnection, SwarmTopology};

/// Structural errors surfaced synchronously to the caller. Execution failures
/// are never reported here; they come back as failed `TaskResult`s.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SwarmError {
    #[error("Agent {0} is already registered")]
    DuplicateAgent(AgentId),

    #[error("Agent {0} not found")]
    AgentNotFound(AgentId),

    #[error(transparent)]
    TaskGraph(#[from] TaskGraphError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),
}

/// Point-in-time snapshot of the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmState {
    pub topology: SwarmTopology,
    pub leader: Option<AgentId>,
    pub agents: Vec<Agent>,
    pub connections: Vec<MeshConnection>,
    pub metrics: Vec<AgentMetrics>,
}

impl SwarmState {
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
