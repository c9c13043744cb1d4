//! # Primary Header
//!
//! The three big-endian 16-bit words at the front of every packet.

use crate::error::ArgumentError;
use crate::HEADER_LEN;

/// Largest 3-bit version number.
pub const MAX_VERSION: u8 = 0b111;

/// Largest 11-bit application identifier.
pub const MAX_APPLICATION_ID: u16 = 0x7FF;

/// Largest 14-bit sequence count.
pub const MAX_SEQUENCE_COUNT: u16 = 0x3FFF;

/// Segmentation state of a packet (2-bit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceFlags {
    /// `0b00`: a middle segment of a larger unit.
    ContinuationSegment,
    /// `0b01`: the first segment.
    FirstSegment,
    /// `0b10`: the last segment.
    LastSegment,
    /// `0b11`: a complete, unsegmented unit.
    Unsegmented,
}

impl SequenceFlags {
    /// All flags in code order.
    pub const ALL: [SequenceFlags; 4] = [
        Self::ContinuationSegment,
        Self::FirstSegment,
        Self::LastSegment,
        Self::Unsegmented,
    ];

    /// Map the low two bits of `bits` to a flag. Total over `u8`.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::ContinuationSegment,
            0b01 => Self::FirstSegment,
            0b10 => Self::LastSegment,
            _ => Self::Unsegmented,
        }
    }

    /// The 2-bit wire code.
    #[must_use]
    pub fn bits(self) -> u8 {
        match self {
            Self::ContinuationSegment => 0b00,
            Self::FirstSegment => 0b01,
            Self::LastSegment => 0b10,
            Self::Unsegmented => 0b11,
        }
    }

    /// Stable name used in decoded messages and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContinuationSegment => "ContinuationSegment",
            Self::FirstSegment => "FirstSegment",
            Self::LastSegment => "LastSegment",
            Self::Unsegmented => "Unsegmented",
        }
    }
}

impl std::fmt::Display for SequenceFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded primary header.
///
/// `declared_data_length` is the raw wire value: the data field is one
/// byte longer than this number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryHeader {
    /// 3-bit version number.
    pub version: u8,
    /// Packet type bit (set for commands, clear for telemetry).
    pub is_command: bool,
    /// Secondary header presence flag. The secondary header itself is not parsed.
    pub has_secondary_header: bool,
    /// 11-bit application identifier.
    pub application_id: u16,
    /// Segmentation flags.
    pub sequence_flags: SequenceFlags,
    /// 14-bit sequence count. Gaps are not checked.
    pub sequence_count: u16,
    /// Raw length field (`data field length - 1`).
    pub declared_data_length: u16,
}

impl PrimaryHeader {
    /// Parse the six header bytes.
    #[must_use]
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        let word1 = u16::from_be_bytes([bytes[0], bytes[1]]);
        let word2 = u16::from_be_bytes([bytes[2], bytes[3]]);
        let word3 = u16::from_be_bytes([bytes[4], bytes[5]]);

        Self {
            version: ((word1 >> 13) & 0b111) as u8,
            is_command: (word1 >> 12) & 1 == 1,
            has_secondary_header: (word1 >> 11) & 1 == 1,
            application_id: word1 & MAX_APPLICATION_ID,
            sequence_flags: SequenceFlags::from_bits((word2 >> 14) as u8),
            sequence_count: word2 & MAX_SEQUENCE_COUNT,
            declared_data_length: word3,
        }
    }

    /// Serialize to the six header bytes.
    ///
    /// Fields are masked to their widths; use [`PrimaryHeader::validate`]
    /// first when the values come from outside the codec.
    #[must_use]
    pub fn write(&self) -> [u8; HEADER_LEN] {
        let word1 = (u16::from(self.version & MAX_VERSION) << 13)
            | (u16::from(self.is_command) << 12)
            | (u16::from(self.has_secondary_header) << 11)
            | (self.application_id & MAX_APPLICATION_ID);
        let word2 = (u16::from(self.sequence_flags.bits()) << 14)
            | (self.sequence_count & MAX_SEQUENCE_COUNT);

        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&word1.to_be_bytes());
        out[2..4].copy_from_slice(&word2.to_be_bytes());
        out[4..6].copy_from_slice(&self.declared_data_length.to_be_bytes());
        out
    }

    /// Check that every field fits its bit width.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::FieldOutOfRange`] naming the first field
    /// that does not fit.
    pub fn validate(&self) -> Result<(), ArgumentError> {
        check_width("version", u32::from(self.version), 3)?;
        check_width("application_id", u32::from(self.application_id), 11)?;
        check_width("sequence_count", u32::from(self.sequence_count), 14)?;
        Ok(())
    }

    /// Length of the data field that follows this header.
    #[must_use]
    pub fn data_field_len(&self) -> usize {
        usize::from(self.declared_data_length) + 1
    }

    /// Total packet length (header plus data field).
    #[must_use]
    pub fn packet_len(&self) -> usize {
        HEADER_LEN + self.data_field_len()
    }

    /// True for the reserved idle application identifier.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.application_id == crate::IDLE_APID
    }
}

fn check_width(field: &'static str, value: u32, bits: u8) -> Result<(), ArgumentError> {
    let max = (1u32 << bits) - 1;
    if value > max {
        return Err(ArgumentError::FieldOutOfRange {
            field,
            value,
            bits,
            max,
        });
    }
    Ok(())
}
