//! # Channel Dispatcher
//!
//! Hands frames from the ingest loop to one delivery lane per channel. A
//! lane is a task that publishes its frames in order; the loop only
//! enqueues, so it never waits on subscribers. A stalled handler holds up
//! its own channel and nothing else.

use futures::FutureExt;
use serde::Serialize;
use shared_bus::{BusError, Publisher};
use shared_types::Envelope;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use super::state::IngestState;

/// Whether a lane's deliveries count toward the ingest counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneKind {
    /// Completed publishes count as `published`, panics as `failed`.
    Telemetry,
    /// Logged only.
    Event,
}

/// Per-channel delivery lanes over one bus.
pub struct ChannelDispatcher<B: ?Sized> {
    bus: Arc<B>,
    state: Arc<IngestState>,
    lanes: HashMap<String, mpsc::UnboundedSender<String>>,
}

impl<B> ChannelDispatcher<B>
where
    B: Publisher + ?Sized + 'static,
{
    pub fn new(bus: Arc<B>, state: Arc<IngestState>) -> Self {
        Self {
            bus,
            state,
            lanes: HashMap::new(),
        }
    }

    /// Wrap `message` in an envelope and queue it on `channel`'s lane.
    ///
    /// Returns once the frame is queued.
    ///
    /// # Errors
    ///
    /// [`BusError::Serialization`] if the envelope cannot be serialized.
    pub fn dispatch<T>(&mut self, channel: &str, kind: LaneKind, message: T) -> Result<(), BusError>
    where
        T: Serialize,
    {
        let frame = Envelope::new(message).to_json()?;

        let frame = match self.lane(channel, kind).send(frame) {
            Ok(()) => return Ok(()),
            // Lane task is gone; start a fresh one
            Err(mpsc::error::SendError(frame)) => frame,
        };
        self.lanes.remove(channel);
        if self.lane(channel, kind).send(frame).is_err() {
            error!(channel = %channel, "Dispatch lane closed, frame dropped");
        }
        Ok(())
    }

    /// Channels with an open lane.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    fn lane(&mut self, channel: &str, kind: LaneKind) -> &mpsc::UnboundedSender<String> {
        let bus = &self.bus;
        let state = &self.state;
        self.lanes.entry(channel.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(run_lane(
                Arc::clone(bus),
                Arc::clone(state),
                channel.to_string(),
                kind,
                rx,
            ));
            trace!(channel = %channel, "Dispatch lane opened");
            tx
        })
    }
}

/// Publish queued frames until every sender is dropped.
async fn run_lane<B>(
    bus: Arc<B>,
    state: Arc<IngestState>,
    channel: String,
    kind: LaneKind,
    mut frames: mpsc::UnboundedReceiver<String>,
) where
    B: Publisher + ?Sized,
{
    while let Some(frame) = frames.recv().await {
        let delivered = AssertUnwindSafe(bus.publish_frame(&channel, frame))
            .catch_unwind()
            .await;

        match delivered {
            Ok(report) => {
                if kind == LaneKind::Telemetry {
                    state.record_published();
                }
                debug!(
                    channel = %channel,
                    handlers = report.handlers,
                    failed = report.failed,
                    "Frame delivered"
                );
            }
            Err(_) => {
                if kind == LaneKind::Telemetry {
                    state.record_failed();
                }
                error!(channel = %channel, "Publish panicked");
            }
        }
    }
    trace!(channel = %channel, "Dispatch lane closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::{InMemoryMessageBus, SubscriberExt};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_frames_on_one_channel_stay_in_order() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let state = Arc::new(IngestState::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe("Telemetry.3", move |n: u32| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(n);
                Ok(())
            }
        });

        let mut dispatcher = ChannelDispatcher::new(Arc::clone(&bus), Arc::clone(&state));
        for n in 0..50u32 {
            dispatcher.dispatch("Telemetry.3", LaneKind::Telemetry, n).unwrap();
        }
        assert_eq!(dispatcher.lane_count(), 1);

        for expected in 0..50u32 {
            let n = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timeout")
                .unwrap();
            assert_eq!(n, expected);
        }
    }

    #[tokio::test]
    async fn test_hung_channel_does_not_block_others() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let state = Arc::new(IngestState::new());
        bus.subscribe("Telemetry.1", |_: serde_json::Value| futures::future::pending());
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe("Telemetry.2", move |v: serde_json::Value| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(v);
                Ok(())
            }
        });

        let mut dispatcher = ChannelDispatcher::new(bus, Arc::clone(&state));
        dispatcher
            .dispatch("Telemetry.1", LaneKind::Telemetry, json!({ "n": 1 }))
            .unwrap();
        dispatcher
            .dispatch("Telemetry.1", LaneKind::Telemetry, json!({ "n": 2 }))
            .unwrap();
        dispatcher
            .dispatch("Telemetry.2", LaneKind::Telemetry, json!({ "n": 3 }))
            .unwrap();

        let delivered = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Telemetry.2 blocked by Telemetry.1")
            .unwrap();
        assert_eq!(delivered["n"], 3);
    }

    #[tokio::test]
    async fn test_event_lanes_are_not_counted() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let state = Arc::new(IngestState::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe("Events.X", move |v: serde_json::Value| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(v);
                Ok(())
            }
        });

        let mut dispatcher = ChannelDispatcher::new(bus, Arc::clone(&state));
        dispatcher.dispatch("Events.X", LaneKind::Event, json!({})).unwrap();

        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(state.snapshot().published, 0);
    }
}
