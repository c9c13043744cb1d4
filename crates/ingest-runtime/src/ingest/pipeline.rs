//! # Ingest Pipeline
//!
//! Single sequential consumer of one [`PacketReceiver`]:
//!
//! ```text
//! receive_next ──→ decode ──┬── error ──→ Events.PacketRejected, continue
//!                           ├── idle  ──→ skip, continue
//!                           └── ok    ──→ Telemetry.{apid} lane
//! ```
//!
//! The loop only decodes and enqueues; delivery to subscribers happens on
//! per-channel lanes (see [`ChannelDispatcher`]), so a slow handler never
//! holds up the next receive. The loop ends only when the receiver reports
//! cancellation (or that it can never produce another packet). Anything
//! that goes wrong while handling one packet, including a panic, is logged
//! and counted.

use chrono::{DateTime, Utc};
use packet_codec::{decode, Packet};
use shared_bus::Publisher;
use shared_types::channels::channel_for_application_id;
use shared_types::{EventKind, IngestStats, PacketRejected, TelemetryPacket};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, trace, warn};

use super::dispatch::{ChannelDispatcher, LaneKind};
use super::state::IngestState;
use crate::adapters::{PacketReceiver, ReceiveError};
use crate::shutdown::ShutdownSignal;

/// Pause after a failed receive before trying again.
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What happened to one received buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Queued for delivery on `channel`.
    Published { channel: String },
    /// Idle packet, not published.
    Idle,
    /// Decode failed.
    Rejected { reason: String },
    /// Decoded but could not be serialized for publishing.
    Failed,
}

/// Map a decoded packet to the message published on its telemetry channel.
pub fn telemetry_message(packet: &Packet<'_>, received_at: DateTime<Utc>) -> TelemetryPacket {
    let header = packet.header();
    TelemetryPacket {
        application_id: header.application_id,
        version: header.version,
        is_command: header.is_command,
        has_secondary_header: header.has_secondary_header,
        sequence_flags: header.sequence_flags.as_str().to_string(),
        sequence_count: header.sequence_count,
        data_length: packet.data_field().len(),
        data_field_base64: TelemetryPacket::encode_data_field(packet.data_field()),
        received_at,
    }
}

/// Decode one buffer and queue the result for delivery.
pub fn process_packet<B>(
    dispatcher: &mut ChannelDispatcher<B>,
    state: &IngestState,
    buffer: &[u8],
) -> PacketOutcome
where
    B: Publisher + ?Sized + 'static,
{
    let received_at = Utc::now();
    state.record_received();

    let packet = match decode(buffer) {
        Ok(packet) => packet,
        Err(e) => {
            state.record_rejected();
            let reason = e.to_string();
            warn!(bytes = buffer.len(), reason = %reason, "Packet rejected");

            let event = PacketRejected {
                reason: reason.clone(),
                byte_len: buffer.len(),
                rejected_at: received_at,
            };
            let channel = EventKind::PacketRejected.channel();
            if let Err(e) = dispatcher.dispatch(&channel, LaneKind::Event, event) {
                error!(error = %e, "Failed to publish PacketRejected");
            }
            return PacketOutcome::Rejected { reason };
        }
    };

    if packet.is_idle() {
        state.record_idle();
        trace!(bytes = buffer.len(), "Idle packet skipped");
        return PacketOutcome::Idle;
    }

    if packet.total_length() < buffer.len() {
        trace!(
            bytes = buffer.len(),
            packet_len = packet.total_length(),
            "Trailing bytes after packet ignored"
        );
    }

    let message = telemetry_message(&packet, received_at);
    let channel = channel_for_application_id(message.application_id);
    state.record_last_packet(message.clone());

    match dispatcher.dispatch(&channel, LaneKind::Telemetry, message) {
        Ok(()) => {
            trace!(channel = %channel, "Telemetry queued");
            PacketOutcome::Published { channel }
        }
        Err(e) => {
            state.record_failed();
            error!(channel = %channel, error = %e, "Failed to publish telemetry");
            PacketOutcome::Failed
        }
    }
}

/// The long-running ingest loop.
pub struct IngestPipeline<R, B: ?Sized> {
    receiver: R,
    bus: Arc<B>,
    state: Arc<IngestState>,
}

impl<R, B> IngestPipeline<R, B>
where
    R: PacketReceiver,
    B: Publisher + ?Sized + 'static,
{
    pub fn new(receiver: R, bus: Arc<B>, state: Arc<IngestState>) -> Self {
        Self {
            receiver,
            bus,
            state,
        }
    }

    /// Run until `shutdown` is set. Returns the counters at exit; frames
    /// still queued on delivery lanes are published afterwards.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> IngestStats {
        info!("Ingest loop started");
        let mut dispatcher = ChannelDispatcher::new(Arc::clone(&self.bus), Arc::clone(&self.state));

        loop {
            let buffer = match self.receiver.receive_next(&mut shutdown).await {
                Ok(buffer) => buffer,
                Err(ReceiveError::Cancelled) => {
                    info!("Ingest loop cancelled");
                    break;
                }
                Err(ReceiveError::Closed) => {
                    warn!("Packet source closed, stopping ingest loop");
                    break;
                }
                Err(ReceiveError::Io(e)) => {
                    warn!(
                        error = %e,
                        backoff_ms = RECEIVE_ERROR_BACKOFF.as_millis(),
                        "Receive failed"
                    );
                    tokio::select! {
                        _ = shutdown.triggered() => {
                            info!("Ingest loop cancelled");
                            break;
                        }
                        _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => continue,
                    }
                }
            };

            let state = &self.state;
            let processed = panic::catch_unwind(AssertUnwindSafe(|| {
                process_packet(&mut dispatcher, state, &buffer)
            }));

            match processed {
                Ok(outcome) => trace!(?outcome, "Packet processed"),
                Err(_) => {
                    self.state.record_failed();
                    error!(bytes = buffer.len(), "Packet processing panicked");
                }
            }
        }

        let stats = self.state.snapshot();
        info!(
            received = stats.received,
            published = stats.published,
            rejected = stats.rejected,
            idle = stats.idle,
            failed = stats.failed,
            lanes = dispatcher.lane_count(),
            "Ingest loop stopped"
        );
        stats
    }
}
