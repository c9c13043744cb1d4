//! # Telemetry Relay Runtime
//!
//! Receives raw telemetry packets, decodes them and distributes the decoded
//! messages over the in-process message bus.
//!
//! ## Modular Structure
//!
//! - `adapters/` - Packet sources, event sinks and broadcast transports
//! - `container/` - Runtime configuration
//! - `handlers/` - Bus subscribers (persistence, broadcast relay, statistics)
//! - `ingest/` - The receive → decode → publish loop
//! - `runtime` - Wiring of all of the above onto one bus

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod ingest;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use container::RuntimeConfig;
pub use runtime::RelayRuntime;
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
