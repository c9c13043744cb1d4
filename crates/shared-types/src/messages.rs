//! # Message Vocabulary
//!
//! Payload types carried inside [`Envelope`](crate::Envelope)s.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// TELEMETRY
// =============================================================================

/// A decoded telemetry packet as published on `Telemetry.{apid}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    pub application_id: u16,
    pub version: u8,
    pub is_command: bool,
    pub has_secondary_header: bool,
    /// Segmentation flag name (`Unsegmented`, `FirstSegment`, ...).
    pub sequence_flags: String,
    pub sequence_count: u16,
    /// Data field length in bytes (declared length + 1).
    pub data_length: usize,
    /// Standard base64 of the data field.
    pub data_field_base64: String,
    pub received_at: DateTime<Utc>,
}

impl TelemetryPacket {
    /// Base64 encoding used for `data_field_base64`.
    #[must_use]
    pub fn encode_data_field(data: &[u8]) -> String {
        BASE64.encode(data)
    }

    /// Decode `data_field_base64` back to bytes.
    pub fn data_field(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.data_field_base64)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// A received buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRejected {
    /// Decoder error text.
    pub reason: String,
    /// Size of the rejected buffer.
    pub byte_len: usize,
    pub rejected_at: DateTime<Utc>,
}

/// Ingest counters were zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatsReset {
    /// Counters as they were immediately before the reset.
    pub previous: IngestStats,
    pub requested_by: String,
    pub reset_at: DateTime<Utc>,
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Zero the ingest counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetIngestStats {
    pub requested_by: String,
}

// =============================================================================
// QUERIES
// =============================================================================

/// Ask for the current ingest counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetIngestStats {}

/// Ingest counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Buffers pulled from the receiver.
    pub received: u64,
    /// Idle packets skipped.
    pub idle: u64,
    /// Buffers that failed to decode.
    pub rejected: u64,
    /// Packets published to a telemetry channel.
    pub published: u64,
    /// Packets that decoded but could not be published.
    pub failed: u64,
}

/// Ask for the most recent packet of one application identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLastPacket {
    pub application_id: u16,
}

/// Answer to [`GetLastPacket`]. `None` if nothing was seen yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPacket {
    pub application_id: u16,
    pub packet: Option<TelemetryPacket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_field_base64() {
        let encoded = TelemetryPacket::encode_data_field(&[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(encoded, "yv66vg==");

        let packet = TelemetryPacket {
            application_id: 42,
            version: 0,
            is_command: false,
            has_secondary_header: false,
            sequence_flags: "Unsegmented".into(),
            sequence_count: 100,
            data_length: 4,
            data_field_base64: encoded,
            received_at: Utc::now(),
        };
        assert_eq!(packet.data_field().unwrap(), vec![0xCA, 0xFE, 0xBA, 0xBE]);
    }

    #[test]
    fn test_stats_default_is_zero() {
        let stats = IngestStats::default();
        assert_eq!(stats.received + stats.idle + stats.rejected + stats.published, 0);
    }
}
