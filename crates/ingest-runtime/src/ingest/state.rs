//! # Ingest State
//!
//! Counters and the most recent packet per application identifier. Shared
//! between the ingest loop and the statistics service.

use parking_lot::RwLock;
use shared_types::{IngestStats, TelemetryPacket};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestState {
    received: AtomicU64,
    idle: AtomicU64,
    rejected: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    last_packets: RwLock<HashMap<u16, TelemetryPacket>>,
}

impl IngestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle(&self) {
        self.idle.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Remember `packet` as the latest for its application identifier.
    pub fn record_last_packet(&self, packet: TelemetryPacket) {
        self.last_packets
            .write()
            .insert(packet.application_id, packet);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn snapshot(&self) -> IngestStats {
        IngestStats {
            received: self.received.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Zero the counters and return their previous values. Last packets
    /// are kept.
    pub fn reset(&self) -> IngestStats {
        IngestStats {
            received: self.received.swap(0, Ordering::Relaxed),
            idle: self.idle.swap(0, Ordering::Relaxed),
            rejected: self.rejected.swap(0, Ordering::Relaxed),
            published: self.published.swap(0, Ordering::Relaxed),
            failed: self.failed.swap(0, Ordering::Relaxed),
        }
    }

    /// Most recent packet seen for `application_id`.
    pub fn last_packet(&self, application_id: u16) -> Option<TelemetryPacket> {
        self.last_packets.read().get(&application_id).cloned()
    }

    /// Application identifiers seen so far, ascending.
    pub fn application_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.last_packets.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
