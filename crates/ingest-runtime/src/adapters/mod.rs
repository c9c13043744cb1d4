//! # Adapters
//!
//! Implementations of the external collaborator ports:
//!
//! - `receiver` / `udp`: packet sources for the ingest loop
//! - `event_sink`: destinations for persisted events
//! - `broadcast`: real-time push transports

pub mod broadcast;
pub mod event_sink;
pub mod receiver;
pub mod udp;

pub use broadcast::{BroadcastTransport, InMemoryBroadcast, TracingBroadcast};
pub use event_sink::{EventRecord, EventSink, InMemoryEventSink, TracingEventSink};
pub use receiver::{in_memory_source, InMemoryPacketReceiver, PacketReceiver, PacketSender, ReceiveError};
pub use udp::UdpPacketReceiver;
