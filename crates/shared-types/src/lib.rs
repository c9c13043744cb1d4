//! # Shared Types Crate
//!
//! This crate contains the `Envelope<T>` wrapper, the message vocabulary and
//! the channel naming rules used on the message bus.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every payload that crosses the bus is defined here.
//! - **Envelope Integrity**: payloads travel inside an `Envelope<T>` serialized
//!   to JSON text, never by reference.
//! - **Stable Channels**: channel names are derived by pure functions in
//!   [`channels`] and never collide across message kinds.

pub mod channels;
pub mod correlation;
pub mod envelope;
pub mod messages;

pub use channels::{CommandKind, EventKind, QueryKind};
pub use correlation::CorrelationId;
pub use envelope::Envelope;
pub use messages::*;
