//! # Ingest Statistics Service
//!
//! Answers the ingest queries over request/reply and handles the reset
//! command.
//!
//! | Channel                     | Kind    | Payload → Reply                  |
//! |-----------------------------|---------|----------------------------------|
//! | `Queries.GetIngestStats`    | query   | `GetIngestStats` → `IngestStats` |
//! | `Queries.GetLastPacket`     | query   | `GetLastPacket` → `LastPacket`   |
//! | `Commands.ResetIngestStats` | command | `ResetIngestStats`, emits `Events.IngestStatsReset` |

use chrono::Utc;
use futures::future;
use shared_bus::{serve, Publisher, PublisherExt, Subscriber, SubscriberExt};
use shared_types::{
    CommandKind, EventKind, GetIngestStats, GetLastPacket, IngestStatsReset, LastPacket,
    QueryKind, ResetIngestStats,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ingest::IngestState;

pub struct StatsService;

impl StatsService {
    /// Register the query responders and the reset command handler.
    pub fn register<B>(bus: &Arc<B>, state: Arc<IngestState>)
    where
        B: Publisher + Subscriber + ?Sized + 'static,
    {
        let stats_state = Arc::clone(&state);
        serve(bus, &QueryKind::GetIngestStats.channel(), move |_: GetIngestStats| {
            future::ready(Ok::<_, anyhow::Error>(stats_state.snapshot()))
        });

        let packet_state = Arc::clone(&state);
        serve(bus, &QueryKind::GetLastPacket.channel(), move |query: GetLastPacket| {
            future::ready(Ok::<_, anyhow::Error>(LastPacket {
                application_id: query.application_id,
                packet: packet_state.last_packet(query.application_id),
            }))
        });

        // Weak: the handler is owned by the bus it publishes to
        let publisher = Arc::downgrade(bus);
        bus.subscribe(
            &CommandKind::ResetIngestStats.channel(),
            move |command: ResetIngestStats| {
                let publisher = publisher.clone();
                let state = Arc::clone(&state);
                async move {
                    let previous = state.reset();
                    info!(
                        requested_by = %command.requested_by,
                        received = previous.received,
                        published = previous.published,
                        "Ingest statistics reset"
                    );

                    let Some(bus) = publisher.upgrade() else {
                        debug!("Bus dropped before IngestStatsReset");
                        return Ok(());
                    };
                    let event = IngestStatsReset {
                        previous,
                        requested_by: command.requested_by,
                        reset_at: Utc::now(),
                    };
                    bus.publish(&EventKind::IngestStatsReset.channel(), event)
                        .await?;
                    Ok(())
                }
            },
        );

        info!("Ingest statistics service registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{InMemoryMessageBus, RequestClient};
    use shared_types::{IngestStats, TelemetryPacket};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<InMemoryMessageBus>, Arc<IngestState>, RequestClient<InMemoryMessageBus>) {
        let bus = Arc::new(InMemoryMessageBus::new());
        let state = Arc::new(IngestState::new());
        StatsService::register(&bus, Arc::clone(&state));
        let client = RequestClient::new(Arc::clone(&bus), Duration::from_secs(1));
        (bus, state, client)
    }

    #[tokio::test]
    async fn test_get_ingest_stats() {
        let (_bus, state, client) = setup();
        state.record_received();
        state.record_published();

        let stats: IngestStats = client
            .request(&QueryKind::GetIngestStats.channel(), GetIngestStats {})
            .await
            .unwrap();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.published, 1);
    }

    #[tokio::test]
    async fn test_get_last_packet() {
        let (_bus, state, client) = setup();

        let missing: LastPacket = client
            .request(
                &QueryKind::GetLastPacket.channel(),
                GetLastPacket { application_id: 42 },
            )
            .await
            .unwrap();
        assert!(missing.packet.is_none());

        state.record_last_packet(TelemetryPacket {
            application_id: 42,
            version: 0,
            is_command: false,
            has_secondary_header: false,
            sequence_flags: "Unsegmented".into(),
            sequence_count: 100,
            data_length: 4,
            data_field_base64: "yv66vg==".into(),
            received_at: Utc::now(),
        });

        let found: LastPacket = client
            .request(
                &QueryKind::GetLastPacket.channel(),
                GetLastPacket { application_id: 42 },
            )
            .await
            .unwrap();
        assert_eq!(found.application_id, 42);
        assert_eq!(found.packet.unwrap().sequence_count, 100);
    }

    #[tokio::test]
    async fn test_reset_command_emits_event() {
        let (bus, state, _client) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe(
            &EventKind::IngestStatsReset.channel(),
            move |event: IngestStatsReset| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(event);
                    Ok(())
                }
            },
        );

        state.record_received();
        state.record_rejected();

        let report = bus
            .publish(
                &CommandKind::ResetIngestStats.channel(),
                ResetIngestStats {
                    requested_by: "operator".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.failed, 0);

        // The reset handler awaits the event publish before returning
        let event = rx.try_recv().unwrap();
        assert_eq!(event.previous.received, 1);
        assert_eq!(event.previous.rejected, 1);
        assert_eq!(event.requested_by, "operator");
        assert_eq!(state.snapshot(), IngestStats::default());
    }
}
