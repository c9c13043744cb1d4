//! # Packet Codec - Telemetry Packet Wire Format
//!
//! Decodes and encodes the fixed 6-byte, big-endian packet header followed
//! by a data field of `declared_data_length + 1` bytes.
//!
//! ## Header Layout
//!
//! ```text
//!  word 1 (bytes 0-1)          word 2 (bytes 2-3)        word 3 (bytes 4-5)
//! ┌─────┬────┬────┬─────────┐ ┌───────┬──────────────┐ ┌──────────────────┐
//! │ ver │type│sec │  APID   │ │ flags │ seq count    │ │ data length - 1  │
//! │  3  │ 1  │ 1  │   11    │ │   2   │     14       │ │       16         │
//! └─────┴────┴────┴─────────┘ └───────┴──────────────┘ └──────────────────┘
//! ```
//!
//! ## Errors
//!
//! - [`FormatError`]: malformed input on decode. Terminal for that call.
//! - [`ArgumentError`]: invalid encode arguments (caller bug).
//!
//! Malformed input is never repaired.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod header;
pub mod packet;

pub use error::{ArgumentError, FormatError};
pub use header::{PrimaryHeader, SequenceFlags};
pub use packet::{decode, decode_at, encode, Packet, PacketFields, Packets};

/// Size of the primary header in bytes.
pub const HEADER_LEN: usize = 6;

/// Smallest valid packet: header plus one data byte.
pub const MIN_PACKET_LEN: usize = HEADER_LEN + 1;

/// Reserved application identifier marking an idle (filler) packet.
pub const IDLE_APID: u16 = 0x7FF;

/// Largest encodable data field (`u16::MAX + 1` bytes).
pub const MAX_DATA_FIELD_LEN: usize = u16::MAX as usize + 1;
