// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Opaque agent identity. Caller-supplied or generated at spawn time; immutable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id of the form `agent-<uuid>`.
    pub fn generate() -> Self {
        Self(format!("agent-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    #[default]
    Worker,
    Leader,
}

/// Lifecycle status.
///
/// `Active ⇄ Busy` while tasks execute; `Terminated` is terminal and only
/// observed on handles taken before the agent was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Busy,
    Terminated,
}

/// Spawn request for a new agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Explicit id; generated when absent
    #[serde(default)]
    pub id: Option<AgentId>,

    /// Type tag, e.g. "coder" or "reviewer"
    #[serde(rename = "type")]
    pub agent_type: String,

    /// Declared task types. Empty means "derive from type".
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default)]
    pub role: AgentRole,

    /// Reporting line under hierarchical topology
    #[serde(default)]
    pub parent: Option<AgentId>,

    /// Domain tag used for consensus affinity. Falls back to `agent_type`.
    #[serde(default)]
    pub domain: Option<String>,
}

impl AgentConfig {
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            id: None,
            agent_type: agent_type.into(),
            capabilities: Vec::new(),
            role: AgentRole::Worker,
            parent: None,
            domain: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<AgentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }

    pub fn leader(self) -> Self {
        self.with_role(AgentRole::Leader)
    }

    pub fn with_parent(mut self, parent: impl Into<AgentId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// A stateful worker descriptor owned by the coordinator's registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub capabilities: BTreeSet<String>,
    pub role: AgentRole,
    pub parent: Option<AgentId>,
    pub domain: Option<String>,
    pub status: AgentStatus,
    /// Executions currently running on this agent
    pub in_flight: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Build an agent from its spawn request. Empty capability lists are
    /// filled from [`default_capabilities`].
    pub fn from_config(config: AgentConfig) -> Self {
        let capabilities: BTreeSet<String> = if config.capabilities.is_empty() {
            default_capabilities(&config.agent_type)
                .iter()
                .map(|c| c.to_string())
                .collect()
        } else {
            config.capabilities.into_iter().collect()
        };
        let now = Utc::now();

        Self {
            id: config.id.unwrap_or_else(AgentId::generate),
            agent_type: config.agent_type,
            capabilities,
            role: config.role,
            parent: config.parent,
            domain: config.domain,
            status: AgentStatus::Active,
            in_flight: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_execute(&self, task_type: &str) -> bool {
        self.capabilities.contains(task_type)
    }

    pub fn is_leader(&self) -> bool {
        self.role == AgentRole::Leader
    }

    /// Domain tag used when this agent votes.
    pub fn domain_tag(&self) -> &str {
        self.domain.as_deref().unwrap_or(&self.agent_type)
    }

    /// Mark one more execution in flight. Returns `false` for a terminated agent.
    pub fn begin_task(&mut self) -> bool {
        if self.status == AgentStatus::Terminated {
            return false;
        }
        self.in_flight += 1;
        self.status = AgentStatus::Busy;
        self.updated_at = Utc::now();
        true
    }

    /// Release one in-flight execution; returns to `Active` when none remain.
    pub fn finish_task(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 && self.status == AgentStatus::Busy {
            self.status = AgentStatus::Active;
        }
        self.updated_at = Utc::now();
    }

    pub fn terminate(&mut self) {
        self.status = AgentStatus::Terminated;
        self.updated_at = Utc::now();
    }
}

/// Capability defaults used by `scale_agents` and by spawn requests without
/// an explicit capability list.
pub fn default_capabilities(agent_type: &str) -> &'static [&'static str] {
    match agent_type {
        "coder" => &["code", "refactor", "debug"],
        "tester" => &["test", "validate", "e2e"],
        "reviewer" => &["review", "analyze", "security-audit"],
        "coordinator" => &["coordinate", "manage", "orchestrate"],
        "designer" => &["design", "prototype"],
        "deployer" => &["deploy", "release"],
        _ => &[],
    }
}
