//! Bus error types.

use shared_types::CorrelationId;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to publishers and requesters.
///
/// Handler failures are not here: they are isolated and logged at the
/// fan-out boundary.
#[derive(Debug, Error)]
pub enum BusError {
    /// The envelope could not be serialized to a text frame.
    #[error("failed to serialize envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No response arrived within the deadline.
    #[error("request {correlation_id} timed out after {timeout:?}")]
    Timeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    /// The response subscription was removed before a response arrived.
    #[error("response channel {channel} closed before a response arrived")]
    Closed { channel: String },
}

impl BusError {
    /// True for [`BusError::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
