// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `conclave-core`: Swarm Domain Primitives
//!
//! Pure domain types for the Conclave swarm runtime plus the in-process
//! infrastructure the coordinator publishes through.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Agent`, `Task`, `AgentMetrics`, topology, consensus value objects, events, config manifest |
//! | [`infrastructure`] | Infrastructure | `EventBus` (tokio broadcast), `InMemoryEventStore` |
//!
//! The orchestration logic itself (`SwarmCoordinator`, `ConsensusEngine`) lives in
//! the `conclave-swarm` crate.

pub mod domain;
pub mod infrastructure;

pub use domain::*;
