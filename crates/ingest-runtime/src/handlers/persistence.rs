//! # Event Persistence
//!
//! Stores every event published on an `Events.*` channel. Commands and
//! queries are never stored.

use anyhow::Context as _;
use chrono::Utc;
use serde_json::Value;
use shared_bus::{Subscriber, SubscriberExt};
use shared_types::EventKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapters::{EventRecord, EventSink};

/// Subscribes to every event channel and writes each event to a sink.
pub struct EventPersistence {
    sink: Arc<dyn EventSink>,
    stored: AtomicU64,
}

impl EventPersistence {
    /// Subscribe to all [`EventKind`] channels on `bus`.
    pub fn attach<B>(bus: &B, sink: Arc<dyn EventSink>) -> Arc<Self>
    where
        B: Subscriber + ?Sized,
    {
        let persistence = Arc::new(Self {
            sink,
            stored: AtomicU64::new(0),
        });

        for kind in EventKind::ALL {
            let this = Arc::clone(&persistence);
            bus.subscribe(&kind.channel(), move |payload: Value| {
                let this = Arc::clone(&this);
                async move { this.store(kind, payload).await }
            });
        }

        info!(channels = EventKind::ALL.len(), "Event persistence attached");
        persistence
    }

    /// Events stored so far.
    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    async fn store(&self, kind: EventKind, payload: Value) -> anyhow::Result<()> {
        let record = EventRecord {
            id: format!("{}:{}", kind.name(), Uuid::new_v4()),
            event_type: kind.name().to_string(),
            payload,
            stored_at: Utc::now(),
        };
        let id = record.id.clone();

        self.sink
            .store(record)
            .await
            .with_context(|| format!("failed to store event {id}"))?;

        self.stored.fetch_add(1, Ordering::Relaxed);
        debug!(id = %id, "Event persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryEventSink;
    use async_trait::async_trait;
    use shared_bus::{InMemoryMessageBus, PublisherExt};
    use shared_types::{CommandKind, PacketRejected, ResetIngestStats};

    #[tokio::test]
    async fn test_event_stored_once_with_prefixed_id() {
        let bus = InMemoryMessageBus::new();
        let sink = Arc::new(InMemoryEventSink::new());
        let persistence = EventPersistence::attach(&bus, sink.clone());

        bus.publish(
            &EventKind::PacketRejected.channel(),
            PacketRejected {
                reason: "buffer too short".into(),
                byte_len: 3,
                rejected_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(persistence.stored(), 1);
        assert_eq!(records[0].event_type, "PacketRejected");
        assert!(records[0].id.starts_with("PacketRejected:"));
        assert_eq!(records[0].payload["byte_len"], 3);
    }

    #[tokio::test]
    async fn test_commands_are_not_stored() {
        let bus = InMemoryMessageBus::new();
        let sink = Arc::new(InMemoryEventSink::new());
        EventPersistence::attach(&bus, sink.clone());

        let report = bus
            .publish(
                &CommandKind::ResetIngestStats.channel(),
                ResetIngestStats {
                    requested_by: "test".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(report.handlers, 0);

        // Canary: the event published afterwards is the only record
        bus.publish(
            &EventKind::PacketRejected.channel(),
            PacketRejected {
                reason: "canary".into(),
                byte_len: 0,
                rejected_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "PacketRejected");
        assert_eq!(records[0].payload["reason"], "canary");
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn store(&self, _record: EventRecord) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk full"))
        }
    }

    #[tokio::test]
    async fn test_sink_failure_is_a_handler_failure() {
        let bus = InMemoryMessageBus::new();
        let persistence = EventPersistence::attach(&bus, Arc::new(FailingSink));

        let report = bus
            .publish(&EventKind::IngestStatsReset.channel(), serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(report.handlers, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(persistence.stored(), 0);
    }
}
