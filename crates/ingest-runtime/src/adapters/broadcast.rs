//! # Broadcast Transports
//!
//! Push targets for [`BroadcastRelay`](crate::handlers::BroadcastRelay).

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// Real-time push port.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Push one message received on `channel`.
    async fn forward(&self, channel: &str, payload: Value) -> anyhow::Result<()>;
}

/// Records every forward, in order.
#[derive(Debug, Default)]
pub struct InMemoryBroadcast {
    forwarded: Mutex<Vec<(String, Value)>>,
}

impl InMemoryBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(channel, payload)` pair forwarded so far.
    pub fn forwarded(&self) -> Vec<(String, Value)> {
        self.forwarded.lock().clone()
    }

    /// Forwards for one channel.
    pub fn forwarded_on(&self, channel: &str) -> usize {
        self.forwarded
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .count()
    }
}

#[async_trait]
impl BroadcastTransport for InMemoryBroadcast {
    async fn forward(&self, channel: &str, payload: Value) -> anyhow::Result<()> {
        self.forwarded.lock().push((channel.to_string(), payload));
        Ok(())
    }
}

/// Logs each forward at debug level. Used when no push transport is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBroadcast;

#[async_trait]
impl BroadcastTransport for TracingBroadcast {
    async fn forward(&self, channel: &str, payload: Value) -> anyhow::Result<()> {
        debug!(channel = %channel, payload = %payload, "Broadcast");
        Ok(())
    }
}
