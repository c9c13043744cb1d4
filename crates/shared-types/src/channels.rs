//! # Channel Routing
//!
//! Pure naming rules. Channel names are map keys on the bus and topic names
//! on any backing transport, so they must be stable and collision-free.
//!
//! | Kind | Channel |
//! |------|---------|
//! | Telemetry | `Telemetry.{apid}` |
//! | Event | `Events.{Kind}` |
//! | Command | `Commands.{Kind}` |
//! | Query | `Queries.{Kind}` |
//! | Response | `{request channel}.Responses.{correlation id}` |

use crate::correlation::CorrelationId;

/// Prefix for decoded telemetry channels.
pub const TELEMETRY_PREFIX: &str = "Telemetry";

/// Prefix for event channels.
pub const EVENTS_PREFIX: &str = "Events";

/// Prefix for command channels.
pub const COMMANDS_PREFIX: &str = "Commands";

/// Prefix for query channels.
pub const QUERIES_PREFIX: &str = "Queries";

/// Suffix appended to a request channel to form its response base.
pub const RESPONSES_SUFFIX: &str = "Responses";

/// Channel carrying decoded packets for one application identifier.
#[must_use]
pub fn channel_for_application_id(application_id: u16) -> String {
    format!("{TELEMETRY_PREFIX}.{application_id}")
}

/// Base channel under which responses to `request_channel` are published.
#[must_use]
pub fn response_base_channel(request_channel: &str) -> String {
    format!("{request_channel}.{RESPONSES_SUFFIX}")
}

/// Ephemeral response channel for one correlated exchange.
#[must_use]
pub fn response_channel(request_channel: &str, correlation_id: &CorrelationId) -> String {
    format!("{}.{}", response_base_channel(request_channel), correlation_id)
}

/// Events published by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A received buffer failed to decode.
    PacketRejected,
    /// Ingest counters were reset by command.
    IngestStatsReset,
}

impl EventKind {
    /// Every event kind. Event persistence subscribes to all of them.
    pub const ALL: [EventKind; 2] = [Self::PacketRejected, Self::IngestStatsReset];

    /// Logical event-type tag.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PacketRejected => "PacketRejected",
            Self::IngestStatsReset => "IngestStatsReset",
        }
    }

    /// Channel this event is published on.
    #[must_use]
    pub fn channel(self) -> String {
        format!("{EVENTS_PREFIX}.{}", self.name())
    }
}

/// Commands accepted by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Zero the ingest counters.
    ResetIngestStats,
}

impl CommandKind {
    pub const ALL: [CommandKind; 1] = [Self::ResetIngestStats];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ResetIngestStats => "ResetIngestStats",
        }
    }

    #[must_use]
    pub fn channel(self) -> String {
        format!("{COMMANDS_PREFIX}.{}", self.name())
    }
}

/// Queries answered through correlated request/reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Current ingest counters.
    GetIngestStats,
    /// Most recent packet seen for one application identifier.
    GetLastPacket,
}

impl QueryKind {
    pub const ALL: [QueryKind; 2] = [Self::GetIngestStats, Self::GetLastPacket];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GetIngestStats => "GetIngestStats",
            Self::GetLastPacket => "GetLastPacket",
        }
    }

    #[must_use]
    pub fn channel(self) -> String {
        format!("{QUERIES_PREFIX}.{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_channel_for_application_id() {
        assert_eq!(channel_for_application_id(42), "Telemetry.42");
        assert_eq!(channel_for_application_id(0), "Telemetry.0");
        assert_eq!(channel_for_application_id(2047), "Telemetry.2047");
    }

    #[test]
    fn test_response_channel_derivation() {
        let id = CorrelationId::new();
        let request = QueryKind::GetIngestStats.channel();
        assert_eq!(
            response_channel(&request, &id),
            format!("Queries.GetIngestStats.Responses.{id}")
        );
        assert!(response_channel(&request, &id).starts_with(&response_base_channel(&request)));
    }

    #[test]
    fn test_named_channels_are_distinct() {
        let mut seen = HashSet::new();
        let names = EventKind::ALL
            .iter()
            .map(|k| k.channel())
            .chain(CommandKind::ALL.iter().map(|k| k.channel()))
            .chain(QueryKind::ALL.iter().map(|k| k.channel()))
            .chain((0..=2047).map(channel_for_application_id));

        for name in names {
            assert!(seen.insert(name.clone()), "duplicate channel {name}");
        }
    }

    #[test]
    fn test_names_are_stable() {
        assert_eq!(EventKind::PacketRejected.channel(), "Events.PacketRejected");
        assert_eq!(
            CommandKind::ResetIngestStats.channel(),
            "Commands.ResetIngestStats"
        );
        assert_eq!(QueryKind::GetLastPacket.channel(), "Queries.GetLastPacket");
    }
}
