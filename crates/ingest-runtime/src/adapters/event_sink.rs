//! # Event Sinks
//!
//! Destinations for events captured by
//! [`EventPersistence`](crate::handlers::EventPersistence).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// One stored event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// `"{event_type}:{uuid}"`.
    pub id: String,
    /// Event kind name, e.g. `PacketRejected`.
    pub event_type: String,
    /// The event payload as delivered.
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
}

/// Event storage port.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Persist one record.
    async fn store(&self, record: EventRecord) -> anyhow::Result<()>;
}

/// Keeps records in memory, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    records: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.read().clone()
    }

    /// Records of one event type.
    pub fn records_of(&self, event_type: &str) -> Vec<EventRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn store(&self, record: EventRecord) -> anyhow::Result<()> {
        self.records.write().push(record);
        Ok(())
    }
}

/// Writes each record to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn store(&self, record: EventRecord) -> anyhow::Result<()> {
        info!(
            id = %record.id,
            event_type = %record.event_type,
            payload = %record.payload,
            "Event stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(event_type: &str) -> EventRecord {
        EventRecord {
            id: format!("{event_type}:1"),
            event_type: event_type.to_string(),
            payload: json!({ "n": 1 }),
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_sink_keeps_order() {
        let sink = InMemoryEventSink::new();
        assert!(sink.is_empty());

        sink.store(record("A")).await.unwrap();
        sink.store(record("B")).await.unwrap();
        sink.store(record("A")).await.unwrap();

        assert_eq!(sink.len(), 3);
        let types: Vec<_> = sink.records().into_iter().map(|r| r.event_type).collect();
        assert_eq!(types, vec!["A", "B", "A"]);
        assert_eq!(sink.records_of("A").len(), 2);
    }
}
