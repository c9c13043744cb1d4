//! # Publisher
//!
//! Defines the publishing side of the bus.

use crate::error::BusError;
use async_trait::async_trait;
use serde::Serialize;
use shared_types::Envelope;

/// Outcome of one publish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Channel the frame was published on.
    pub channel: String,
    /// Handlers in the delivery snapshot.
    pub handlers: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl DeliveryReport {
    /// Report for a publish that found no handlers.
    #[must_use]
    pub fn empty(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            handlers: 0,
            failed: 0,
        }
    }

    /// Handlers that completed successfully.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.handlers - self.failed
    }
}

/// Object-safe publishing capability.
///
/// Implementations receive already-serialized envelope frames. Any backing
/// transport that delivers the frame unchanged to every handler registered
/// on `channel` is substitutable.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `frame` to every handler currently registered on `channel`.
    ///
    /// Never fails because of a handler; failures are counted in the report.
    async fn publish_frame(&self, channel: &str, frame: String) -> DeliveryReport;
}

/// Typed publishing on top of [`Publisher`].
#[async_trait]
pub trait PublisherExt: Publisher {
    /// Wrap `message` in a new [`Envelope`] and publish it.
    ///
    /// # Errors
    ///
    /// [`BusError::Serialization`] if the envelope cannot be serialized.
    /// Zero handlers is not an error.
    async fn publish<T>(&self, channel: &str, message: T) -> Result<DeliveryReport, BusError>
    where
        T: Serialize + Send,
    {
        self.publish_envelope(channel, Envelope::new(message)).await
    }

    /// Publish a caller-built envelope (for custom headers).
    async fn publish_envelope<T>(
        &self,
        channel: &str,
        envelope: Envelope<T>,
    ) -> Result<DeliveryReport, BusError>
    where
        T: Serialize + Send,
    {
        let frame = envelope.to_json()?;
        Ok(self.publish_frame(channel, frame).await)
    }
}

impl<P: Publisher + ?Sized> PublisherExt for P {}
