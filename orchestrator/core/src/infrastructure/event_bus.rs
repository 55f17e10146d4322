// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Swarm Events
//
// In-memory fan-out over a tokio broadcast channel. Publishing never blocks;
// a subscriber that falls more than `capacity` events behind observes
// `EventBusError::Lagged` and continues from the oldest retained event.

use crate::domain::agent::AgentId;
use crate::domain::events::{AgentLifecycleEvent, AgentMessage, ConsensusEvent, TaskEvent, TopologyEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    AgentLifecycle(AgentLifecycleEvent),
    Task(TaskEvent),
    Consensus(ConsensusEvent),
    Topology(TopologyEvent),
    Message(AgentMessage),
}

impl DomainEvent {
    /// Dotted event name, e.g. `agent.spawned`
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentLifecycle(e) => e.name(),
            Self::Task(e) => e.name(),
            Self::Consensus(e) => e.name(),
            Self::Topology(e) => e.name(),
            Self::Message(m) => m.name(),
        }
    }

    /// Whether this event is about `agent_id`.
    pub fn concerns(&self, agent_id: &AgentId) -> bool {
        match self {
            Self::AgentLifecycle(e) => e.agent_id() == agent_id,
            Self::Task(e) => e.agent_id() == Some(agent_id),
            Self::Consensus(ConsensusEvent::VoteCast { voter, .. }) => voter == agent_id,
            Self::Consensus(_) => false,
            Self::Topology(TopologyEvent::SwarmScaled {
                spawned, terminated, ..
            }) => spawned.contains(agent_id) || terminated.contains(agent_id),
            Self::Topology(_) => false,
            Self::Message(m) => m.concerns(agent_id),
        }
    }
}

/// Event bus for publishing and subscribing to swarm events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_agent_event(&self, event: AgentLifecycleEvent) {
        self.publish(DomainEvent::AgentLifecycle(event));
    }

    pub fn publish_task_event(&self, event: TaskEvent) {
        self.publish(DomainEvent::Task(event));
    }

    pub fn publish_consensus_event(&self, event: ConsensusEvent) {
        self.publish(DomainEvent::Consensus(event));
    }

    pub fn publish_topology_event(&self, event: TopologyEvent) {
        self.publish(DomainEvent::Topology(event));
    }

    pub fn publish_message(&self, message: AgentMessage) {
        self.publish(DomainEvent::Message(message));
    }

    /// Publish a domain event to all subscribers
    pub fn publish(&self, event: DomainEvent) {
        debug!(event = event.name(), "Publishing event");

        // send() only fails when there are no receivers
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events concerning a single agent
    pub fn subscribe_agent(&self, agent_id: AgentId) -> AgentEventReceiver {
        AgentEventReceiver {
            receiver: self.sender.subscribe(),
            agent_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered, skipping over lag gaps.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => events.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}

/// Receiver for a single agent's events (filtered)
pub struct AgentEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    agent_id: AgentId,
}

impl AgentEventReceiver {
    /// Receive the next event concerning this agent
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.concerns(&self.agent_id) {
                return Ok(event);
            }
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
