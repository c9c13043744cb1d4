//! # Ingest
//!
//! The receive → decode → route → publish loop, its per-channel delivery
//! lanes and the counters it keeps.

pub mod dispatch;
pub mod pipeline;
pub mod state;

pub use dispatch::{ChannelDispatcher, LaneKind};
pub use pipeline::{process_packet, telemetry_message, IngestPipeline, PacketOutcome, RECEIVE_ERROR_BACKOFF};
pub use state::IngestState;
