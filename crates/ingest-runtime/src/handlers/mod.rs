//! # Bus Handlers
//!
//! Subscribers wired onto the message bus by the runtime.

pub mod broadcast_relay;
pub mod persistence;
pub mod stats;

pub use broadcast_relay::BroadcastRelay;
pub use persistence::EventPersistence;
pub use stats::StatsService;
