// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the coordinator, the consensus engine and the narrow
//! service contract external collaborators (UI, persistence, CLIs) use.

pub mod consensus;
pub mod coordinator;

pub use consensus::ConsensusEngine;
pub use coordinator::SwarmCoordinator;

use async_trait::async_trait;
use conclave_core::domain::agent::{Agent, AgentConfig, AgentId};
use conclave_core::domain::swarm::{SwarmError, SwarmState};
use conclave_core::domain::task::Task;
use conclave_core::infrastructure::event_bus::EventReceiver;

use crate::domain::distribution::BatchOutcome;

/// Task submission, result retrieval and event subscription.
#[async_trait]
pub trait SwarmService: Send + Sync {
    async fn spawn_agent(&self, config: AgentConfig) -> Result<Agent, SwarmError>;
    async fn terminate_agent(&self, agent_id: &AgentId) -> bool;
    /// Runs the batch in dependency tiers
    async fn submit_tasks(&self, tasks: Vec<Task>) -> Result<BatchOutcome, SwarmError>;
    async fn send_message(
        &self,
        from: AgentId,
        to: Option<AgentId>,
        payload: serde_json::Value,
    ) -> Result<(), SwarmError>;
    fn subscribe(&self) -> EventReceiver;
    fn state(&self) -> SwarmState;
}

#[async_trait]
impl SwarmService for SwarmCoordinator {
    async fn spawn_agent(&self, config: AgentConfig) -> Result<Agent, SwarmError> {
        SwarmCoordinator::spawn_agent(self, config).await
    }

    async fn terminate_agent(&self, agent_id: &AgentId) -> bool {
        SwarmCoordinator::terminate_agent(self, agent_id).await
    }

    async fn submit_tasks(&self, tasks: Vec<Task>) -> Result<BatchOutcome, SwarmError> {
        self.execute_in_dependency_tiers(&tasks).await
    }

    async fn send_message(
        &self,
        from: AgentId,
        to: Option<AgentId>,
        payload: serde_json::Value,
    ) -> Result<(), SwarmError> {
        SwarmCoordinator::send_message(self, &from, to.as_ref(), payload)
    }

    fn subscribe(&self) -> EventReceiver {
        SwarmCoordinator::subscribe(self)
    }

    fn state(&self) -> SwarmState {
        self.get_swarm_state()
    }
}
