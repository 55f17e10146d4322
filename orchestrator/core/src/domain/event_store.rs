// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRecordType {
    TaskComplete,
    Event,
}

/// Durable trace of a significant coordinator event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub agent_id: AgentId,
    pub content: String,
    #[serde(rename = "type")]
    pub record_type: EventRecordType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventRecord {
    pub fn new(
        id: impl Into<String>,
        agent_id: AgentId,
        content: impl Into<String>,
        record_type: EventRecordType,
    ) -> Self {
        Self {
            id: id.into(),
            agent_id,
            content: content.into(),
            record_type,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Write-only sink. Failures never affect coordinator correctness.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn store(&self, record: EventRecord) -> anyhow::Result<()>;
}
