// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::{AgentId, AgentRole};
use crate::domain::consensus::{ProposalId, ProposalStatus, ResolutionPath, VoteChoice};
use crate::domain::metrics::AgentHealth;
use crate::domain::task::{TaskId, TaskPriority};
use crate::domain::topology::SwarmTopology;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentLifecycleEvent {
    AgentSpawned {
        agent_id: AgentId,
        agent_type: String,
        role: AgentRole,
        spawned_at: DateTime<Utc>,
    },
    AgentTerminated {
        agent_id: AgentId,
        terminated_at: DateTime<Utc>,
    },
    AgentHealthChanged {
        agent_id: AgentId,
        from: AgentHealth,
        to: AgentHealth,
        changed_at: DateTime<Utc>,
    },
}

impl AgentLifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentSpawned { .. } => "agent.spawned",
            Self::AgentTerminated { .. } => "agent.terminated",
            Self::AgentHealthChanged { .. } => "agent.health_changed",
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::AgentSpawned { agent_id, .. }
            | Self::AgentTerminated { agent_id, .. }
            | Self::AgentHealthChanged { agent_id, .. } => agent_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskDistributed {
        task_id: TaskId,
        agent_id: AgentId,
        priority: TaskPriority,
        assigned_at: DateTime<Utc>,
    },
    /// No active agent declared the task type
    TaskUnassigned {
        task_id: TaskId,
        task_type: String,
        skipped_at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: TaskId,
        agent_id: AgentId,
        duration_ms: u64,
        completed_at: DateTime<Utc>,
    },
    TaskFailed {
        task_id: TaskId,
        agent_id: AgentId,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskDistributed { .. } => "task.distributed",
            Self::TaskUnassigned { .. } => "task.unassigned",
            Self::TaskCompleted { .. } => "task.completed",
            Self::TaskFailed { .. } => "task.failed",
        }
    }

    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            Self::TaskDistributed { agent_id, .. }
            | Self::TaskCompleted { agent_id, .. }
            | Self::TaskFailed { agent_id, .. } => Some(agent_id),
            Self::TaskUnassigned { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConsensusEvent {
    ProposalCreated {
        proposal_id: ProposalId,
        value: serde_json::Value,
        proposed_at: DateTime<Utc>,
    },
    VoteCast {
        proposal_id: ProposalId,
        voter: AgentId,
        choice: VoteChoice,
        weight: f64,
        cast_at: DateTime<Utc>,
    },
    /// Proposal closed as accepted or rejected
    ConsensusAchieved {
        proposal_id: ProposalId,
        status: ProposalStatus,
        approval_ratio: f64,
        resolution: ResolutionPath,
        resolved_at: DateTime<Utc>,
    },
    /// Proposal closed without a decisive signal
    ConsensusExpired {
        proposal_id: ProposalId,
        votes_cast: usize,
        resolution: ResolutionPath,
        expired_at: DateTime<Utc>,
    },
}

impl ConsensusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProposalCreated { .. } => "consensus.proposed",
            Self::VoteCast { .. } => "consensus.vote_cast",
            Self::ConsensusAchieved { .. } => "consensus.achieved",
            Self::ConsensusExpired { .. } => "consensus.expired",
        }
    }

    pub fn proposal_id(&self) -> ProposalId {
        match self {
            Self::ProposalCreated { proposal_id, .. }
            | Self::VoteCast { proposal_id, .. }
            | Self::ConsensusAchieved { proposal_id, .. }
            | Self::ConsensusExpired { proposal_id, .. } => *proposal_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TopologyEvent {
    TopologyReconfigured {
        from: SwarmTopology,
        to: SwarmTopology,
        connection_count: usize,
        reconfigured_at: DateTime<Utc>,
    },
    SwarmScaled {
        agent_type: String,
        requested: i64,
        spawned: Vec<AgentId>,
        terminated: Vec<AgentId>,
        scaled_at: DateTime<Utc>,
    },
}

impl TopologyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TopologyReconfigured { .. } => "topology.reconfigured",
            Self::SwarmScaled { .. } => "swarm.scaled",
        }
    }
}

/// Point-to-point or broadcast payload between agents. `to = None` is a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from: AgentId,
    pub to: Option<AgentId>,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn name(&self) -> &'static str {
        "agent.message"
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }

    /// Whether `agent_id` sent or should receive this message.
    pub fn concerns(&self, agent_id: &AgentId) -> bool {
        &self.from == agent_id || self.to.as_ref().map_or(true, |to| to == agent_id)
    }
}
