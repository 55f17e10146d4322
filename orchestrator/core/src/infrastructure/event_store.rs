// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::domain::agent::AgentId;
use crate::domain::event_store::{EventRecord, EventStore};

/// Append-only in-process sink for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    records: Arc<RwLock<Vec<EventRecord>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record in write order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn records_for(&self, agent_id: &AgentId) -> Vec<EventRecord> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| &r.agent_id == agent_id)
            .cloned()
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<EventRecord> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn store(&self, record: EventRecord) -> anyhow::Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("event store lock poisoned"))?;
        records.push(record);
        Ok(())
    }
}
