//! Codec error types.

use thiserror::Error;

/// Malformed, short or inconsistent binary input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Fewer than 7 bytes remain from the decode offset.
    #[error("buffer too short: {available} bytes available, at least {required} required")]
    BufferTooShort { available: usize, required: usize },

    /// The declared data length runs past the end of the buffer.
    #[error("declared length exceeds buffer: packet needs {required} bytes, {available} available")]
    DeclaredLengthExceedsBuffer { required: usize, available: usize },
}

/// Invalid arguments passed to the encoder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// Every packet carries at least one data byte.
    #[error("data field must be non-empty")]
    EmptyDataField,

    /// The data field cannot be described by the 16-bit length field.
    #[error("data field of {len} bytes exceeds maximum of {max}")]
    DataFieldTooLong { len: usize, max: usize },

    /// A header field does not fit its bit width.
    #[error("{field} value {value} exceeds {bits}-bit maximum {max}")]
    FieldOutOfRange {
        field: &'static str,
        value: u32,
        bits: u8,
        max: u32,
    },
}
