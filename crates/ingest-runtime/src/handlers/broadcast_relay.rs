//! # Broadcast Relay
//!
//! Forwards messages delivered on selected channels to a
//! [`BroadcastTransport`], once per delivery.

use serde_json::Value;
use shared_bus::{Subscriber, SubscriberExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::adapters::BroadcastTransport;

pub struct BroadcastRelay {
    transport: Arc<dyn BroadcastTransport>,
    channels: Vec<String>,
    forwarded: AtomicU64,
}

impl BroadcastRelay {
    /// Subscribe to each of `channels` on `bus`.
    pub fn attach<B>(bus: &B, transport: Arc<dyn BroadcastTransport>, channels: Vec<String>) -> Arc<Self>
    where
        B: Subscriber + ?Sized,
    {
        let relay = Arc::new(Self {
            transport,
            channels,
            forwarded: AtomicU64::new(0),
        });

        for channel in &relay.channels {
            let this = Arc::clone(&relay);
            let name: Arc<str> = Arc::from(channel.as_str());
            bus.subscribe(channel, move |payload: Value| {
                let this = Arc::clone(&this);
                let channel = Arc::clone(&name);
                async move {
                    this.transport.forward(&channel, payload).await?;
                    this.forwarded.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            });
        }

        info!(channels = ?relay.channels, "Broadcast relay attached");
        relay
    }

    /// Channels being relayed.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Messages forwarded so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBroadcast;
    use serde_json::json;
    use shared_bus::{InMemoryMessageBus, PublisherExt};

    #[tokio::test]
    async fn test_forwards_only_configured_channels() {
        let bus = InMemoryMessageBus::new();
        let transport = Arc::new(InMemoryBroadcast::new());
        let relay = BroadcastRelay::attach(&bus, transport.clone(), vec!["Telemetry.42".into()]);

        bus.publish("Telemetry.42", json!({ "n": 1 })).await.unwrap();
        bus.publish("Telemetry.43", json!({ "n": 2 })).await.unwrap();
        bus.publish("Telemetry.42", json!({ "n": 3 })).await.unwrap();

        assert_eq!(relay.forwarded(), 2);
        let forwarded = transport.forwarded();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[0], ("Telemetry.42".to_string(), json!({ "n": 1 })));
        assert_eq!(forwarded[1].1["n"], 3);
        assert_eq!(transport.forwarded_on("Telemetry.43"), 0);
    }
}
