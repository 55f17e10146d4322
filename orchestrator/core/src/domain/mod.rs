// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! No I/O dependencies. Everything here is a value object, an aggregate the
//! coordinator owns, or a contract implemented elsewhere.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`agent`] | `Agent`, `AgentId`, `AgentConfig`, `AgentRole`, `AgentStatus` |
//! | [`task`] | `Task`, `TaskId`, `TaskPriority`, `TaskAssignment`, `TaskResult` |
//! | [`metrics`] | `AgentMetrics`, `MetricsTracker`, `AgentHealth` |
//! | [`topology`] | `SwarmTopology`, `MeshConnection`, `ConnectionGraph` |
//! | [`consensus`] | `Proposal`, `Vote`, `ConsensusConfig`, `Tally` |
//! | [`events`] | Lifecycle, task, consensus and topology events |
//! | [`runtime`] | `TaskExecutor` contract |
//! | [`event_store`] | `EventStore` contract, `EventRecord` |
//! | [`swarm`] | `SwarmError`, `SwarmState` |
//! | [`swarm_config`] | `SwarmConfigManifest` (YAML) |

pub mod agent;
pub mod task;
pub mod metrics;
pub mod topology;
pub mod consensus;
pub mod events;
pub mod runtime;
pub mod event_store;
pub mod swarm;
pub mod swarm_config;
