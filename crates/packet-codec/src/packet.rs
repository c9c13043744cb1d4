//! # Packet Decode / Encode
//!
//! [`Packet`] is a read-only view borrowing the buffer it was decoded from.
//! It is never mutated after construction.

use crate::error::{ArgumentError, FormatError};
use crate::header::{PrimaryHeader, SequenceFlags};
use crate::{HEADER_LEN, MAX_DATA_FIELD_LEN, MIN_PACKET_LEN};

/// A decoded packet borrowing its source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    header: PrimaryHeader,
    data_field: &'a [u8],
}

impl<'a> Packet<'a> {
    /// The decoded primary header.
    #[must_use]
    pub fn header(&self) -> &PrimaryHeader {
        &self.header
    }

    /// The data field: exactly `declared_data_length + 1` bytes.
    #[must_use]
    pub fn data_field(&self) -> &'a [u8] {
        self.data_field
    }

    /// Idle packets decode fine but carry nothing of interest.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.header.is_idle()
    }

    /// Header plus data field length.
    #[must_use]
    pub fn total_length(&self) -> usize {
        HEADER_LEN + self.data_field.len()
    }

    /// The encode arguments that reproduce this packet.
    #[must_use]
    pub fn fields(&self) -> PacketFields {
        PacketFields {
            version: self.header.version,
            is_command: self.header.is_command,
            has_secondary_header: self.header.has_secondary_header,
            application_id: self.header.application_id,
            sequence_flags: self.header.sequence_flags,
            sequence_count: self.header.sequence_count,
        }
    }
}

/// Decode the packet at the start of `buffer`.
///
/// # Errors
///
/// See [`decode_at`].
pub fn decode(buffer: &[u8]) -> Result<Packet<'_>, FormatError> {
    decode_at(buffer, 0)
}

/// Decode the packet starting at `offset`.
///
/// # Errors
///
/// - [`FormatError::BufferTooShort`] if fewer than 7 bytes remain from `offset`
/// - [`FormatError::DeclaredLengthExceedsBuffer`] if the data field runs past the end
pub fn decode_at(buffer: &[u8], offset: usize) -> Result<Packet<'_>, FormatError> {
    let available = buffer.len().saturating_sub(offset);
    if available < MIN_PACKET_LEN {
        return Err(FormatError::BufferTooShort {
            available,
            required: MIN_PACKET_LEN,
        });
    }

    let mut header_bytes = [0u8; HEADER_LEN];
    header_bytes.copy_from_slice(&buffer[offset..offset + HEADER_LEN]);
    let header = PrimaryHeader::parse(&header_bytes);

    let required = header.packet_len();
    if required > available {
        return Err(FormatError::DeclaredLengthExceedsBuffer {
            required,
            available,
        });
    }

    let data_start = offset + HEADER_LEN;
    Ok(Packet {
        header,
        data_field: &buffer[data_start..offset + required],
    })
}

/// Header arguments for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketFields {
    pub version: u8,
    pub is_command: bool,
    pub has_secondary_header: bool,
    pub application_id: u16,
    pub sequence_flags: SequenceFlags,
    pub sequence_count: u16,
}

impl PacketFields {
    /// Version 0, unsegmented telemetry for `application_id`.
    #[must_use]
    pub fn telemetry(application_id: u16, sequence_count: u16) -> Self {
        Self {
            version: 0,
            is_command: false,
            has_secondary_header: false,
            application_id,
            sequence_flags: SequenceFlags::Unsegmented,
            sequence_count,
        }
    }

    /// Version 0, unsegmented command for `application_id`.
    #[must_use]
    pub fn command(application_id: u16, sequence_count: u16) -> Self {
        Self {
            is_command: true,
            ..Self::telemetry(application_id, sequence_count)
        }
    }
}

/// Build a packet buffer of exactly `6 + data_field.len()` bytes.
///
/// # Errors
///
/// - [`ArgumentError::EmptyDataField`] if `data_field` is empty
/// - [`ArgumentError::DataFieldTooLong`] if it exceeds 65536 bytes
/// - [`ArgumentError::FieldOutOfRange`] if a header field does not fit its width
pub fn encode(fields: &PacketFields, data_field: &[u8]) -> Result<Vec<u8>, ArgumentError> {
    if data_field.is_empty() {
        return Err(ArgumentError::EmptyDataField);
    }
    if data_field.len() > MAX_DATA_FIELD_LEN {
        return Err(ArgumentError::DataFieldTooLong {
            len: data_field.len(),
            max: MAX_DATA_FIELD_LEN,
        });
    }

    let header = PrimaryHeader {
        version: fields.version,
        is_command: fields.is_command,
        has_secondary_header: fields.has_secondary_header,
        application_id: fields.application_id,
        sequence_flags: fields.sequence_flags,
        sequence_count: fields.sequence_count,
        // Length checked above, so this cannot truncate
        declared_data_length: (data_field.len() - 1) as u16,
    };
    header.validate()?;

    let mut buffer = Vec::with_capacity(HEADER_LEN + data_field.len());
    buffer.extend_from_slice(&header.write());
    buffer.extend_from_slice(data_field);
    Ok(buffer)
}

/// Iterator over back-to-back packets in one buffer.
///
/// Stops after the buffer is exhausted or after yielding the first error.
pub struct Packets<'a> {
    buffer: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Packets<'a> {
    #[must_use]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            failed: false,
        }
    }

    /// Offset of the next undecoded byte.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Packets<'a> {
    type Item = Result<Packet<'a>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buffer.len() {
            return None;
        }
        match decode_at(self.buffer, self.offset) {
            Ok(packet) => {
                self.offset += packet.total_length();
                Some(Ok(packet))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
