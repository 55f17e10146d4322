// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod event_store;

pub use event_bus::{AgentEventReceiver, DomainEvent, EventBus, EventBusError, EventReceiver};
pub use event_store::InMemoryEventStore;
