// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `conclave-swarm`: Multi-Agent Coordination Crate
//!
//! Spawns agents, distributes tasks across them under a mesh or hierarchical
//! topology, tracks per-agent health and resolves group decisions by weighted
//! quorum voting.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Distribution`, `BatchOutcome`, `ScaleRequest`, least-loaded planning |
//! | [`application`] | Application | `SwarmCoordinator`, `ConsensusEngine`, `SwarmService` |
//!
//! ## Key Concepts
//!
//! - **Coordinator**: caller-owned; there is no process-wide instance. Share it
//!   behind an `Arc` when several tasks need it.
//! - **Failures are data**: executor errors and panics become failed
//!   `TaskResult`s. Only structural input errors return `Err`.
//! - **Expired ≠ rejected**: a proposal that never reaches quorum before its
//!   timeout closes as `Expired`.
//!
//! ## Limitations
//!
//! Terminating an agent does not cancel its in-flight work unless
//! `execution.cancel_in_flight_on_terminate` is enabled.

pub mod domain;
pub mod application;

pub use application::{ConsensusEngine, SwarmCoordinator, SwarmService};
pub use domain::*;
