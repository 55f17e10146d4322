// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Topology
//!
//! Directed communication edges between registered agents.
//!
//! - **Mesh**: every ordered pair of agents gets a `Peer` edge, so `n` agents
//!   produce `n * (n - 1)` connections.
//! - **Hierarchical**: every non-leader gets exactly one `Leader` edge, to its
//!   declared parent when that parent is registered, otherwise to the current
//!   leader (the first leader in registry order).
//!
//! Spawns are applied incrementally; [`ConnectionGraph::rebuild`] is the full
//! reconstruction used on reconfiguration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::agent::{Agent, AgentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SwarmTopology {
    #[default]
    Mesh,
    Hierarchical,
}

impl fmt::Display for SwarmTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mesh => f.write_str("mesh"),
            Self::Hierarchical => f.write_str("hierarchical"),
        }
    }
}

impl FromStr for SwarmTopology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mesh" => Ok(Self::Mesh),
            "hierarchical" => Ok(Self::Hierarchical),
            other => Err(format!("unknown topology '{}'. Expected mesh or hierarchical", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Peer,
    Leader,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshConnection {
    pub from: AgentId,
    pub to: AgentId,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
}

impl MeshConnection {
    fn peer(from: &AgentId, to: &AgentId) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            connection_type: ConnectionType::Peer,
        }
    }

    fn leader(from: &AgentId, to: &AgentId) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
            connection_type: ConnectionType::Leader,
        }
    }

    pub fn touches(&self, agent_id: &AgentId) -> bool {
        &self.from == agent_id || &self.to == agent_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyMember {
    pub id: AgentId,
    /// Registered declared parent, else the current leader
    pub parent: Option<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmHierarchy {
    pub leader: Option<AgentId>,
    pub workers: Vec<HierarchyMember>,
}

/// First leader in registry order.
pub fn current_leader(agents: &[Agent]) -> Option<&Agent> {
    agents.iter().find(|a| a.is_leader())
}

/// Reporting lines for every non-leader agent.
pub fn hierarchy_of(agents: &[Agent]) -> SwarmHierarchy {
    let leader = current_leader(agents).map(|a| a.id.clone());
    let workers = agents
        .iter()
        .filter(|a| !a.is_leader())
        .map(|a| HierarchyMember {
            id: a.id.clone(),
            parent: report_target(a, agents),
        })
        .collect();

    SwarmHierarchy { leader, workers }
}

/// Where `agent` reports: its declared parent while that parent is
/// registered, otherwise the current leader. Never the agent itself.
pub fn report_target(agent: &Agent, agents: &[Agent]) -> Option<AgentId> {
    let declared = agent
        .parent
        .as_ref()
        .filter(|p| *p != &agent.id && agents.iter().any(|a| &a.id == *p));

    declared
        .cloned()
        .or_else(|| current_leader(agents).map(|l| l.id.clone()))
        .filter(|target| target != &agent.id)
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    topology: SwarmTopology,
    connections: Vec<MeshConnection>,
}

impl ConnectionGraph {
    pub fn new(topology: SwarmTopology) -> Self {
        Self {
            topology,
            connections: Vec::new(),
        }
    }

    pub fn topology(&self) -> SwarmTopology {
        self.topology
    }

    pub fn connections(&self) -> &[MeshConnection] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Wire a newly registered agent. `agents` is the registry including `agent`.
    pub fn on_spawn(&mut self, agent: &Agent, agents: &[Agent]) {
        match self.topology {
            SwarmTopology::Mesh => {
                for other in agents.iter().filter(|o| o.id != agent.id) {
                    self.connections.push(MeshConnection::peer(&agent.id, &other.id));
                    self.connections.push(MeshConnection::peer(&other.id, &agent.id));
                }
            }
            SwarmTopology::Hierarchical if agent.is_leader() => {
                // A new leader may adopt workers that were orphaned.
                self.rebuild(SwarmTopology::Hierarchical, agents);
            }
            SwarmTopology::Hierarchical => {
                if let Some(target) = report_target(agent, agents) {
                    self.connections.push(MeshConnection::leader(&agent.id, &target));
                }
            }
        }
    }

    /// Scrub every edge touching `agent_id`.
    pub fn on_terminate(&mut self, agent_id: &AgentId) {
        self.connections.retain(|c| !c.touches(agent_id));
    }

    /// Replace the mode and rebuild from scratch.
    pub fn rebuild(&mut self, topology: SwarmTopology, agents: &[Agent]) {
        self.topology = topology;
        self.connections.clear();

        match topology {
            SwarmTopology::Mesh => {
                for a in agents {
                    for b in agents.iter().filter(|b| b.id != a.id) {
                        self.connections.push(MeshConnection::peer(&a.id, &b.id));
                    }
                }
            }
            SwarmTopology::Hierarchical => {
                for agent in agents.iter().filter(|a| !a.is_leader()) {
                    if let Some(target) = report_target(agent, agents) {
                        self.connections.push(MeshConnection::leader(&agent.id, &target));
                    }
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }
}
