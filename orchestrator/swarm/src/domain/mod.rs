// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! Pure scheduling types. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`distribution`] | `Distribution`, `BatchOutcome`, `ScaleRequest`, `plan_distribution` |

pub mod distribution;

pub use distribution::*;
