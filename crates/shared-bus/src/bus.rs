//! # In-Memory Message Bus
//!
//! Channel-keyed registry of frame handlers. Suitable for single-process
//! operation; a networked broker would implement the same
//! [`Publisher`]/[`Subscriber`] traits.

use crate::publisher::{DeliveryReport, Publisher};
use crate::subscriber::{FrameHandler, Subscriber};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// In-memory implementation of the message bus.
///
/// The registry is the only mutable shared state. Registration and removal
/// take the write lock, so a publish sees a handler either fully registered
/// or not at all.
pub struct InMemoryMessageBus {
    /// Handlers by channel.
    registry: RwLock<HashMap<String, Vec<FrameHandler>>>,

    /// Total frames published.
    frames_published: AtomicU64,

    /// Total handler invocations that failed or panicked.
    handler_failures: AtomicU64,
}

impl InMemoryMessageBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            frames_published: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    /// Number of handlers registered on `channel`.
    #[must_use]
    pub fn handler_count(&self, channel: &str) -> usize {
        self.registry.read().get(channel).map_or(0, Vec::len)
    }

    /// Channels with at least one handler, sorted.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.registry.read().keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Total frames published.
    #[must_use]
    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    /// Total failed handler invocations.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }

    /// Remove every handler on every channel.
    pub fn shutdown(&self) {
        let removed: usize = {
            let mut registry = self.registry.write();
            let count = registry.values().map(Vec::len).sum();
            registry.clear();
            count
        };
        debug!(handlers = removed, "Message bus shut down");
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriber for InMemoryMessageBus {
    fn subscribe_frame(&self, channel: &str, handler: FrameHandler) {
        let count = {
            let mut registry = self.registry.write();
            let handlers = registry.entry(channel.to_string()).or_default();
            handlers.push(handler);
            handlers.len()
        };
        debug!(channel = %channel, handlers = count, "Handler subscribed");
    }

    fn unsubscribe(&self, channel: &str) {
        let removed = self.registry.write().remove(channel);
        if let Some(handlers) = removed {
            debug!(channel = %channel, removed = handlers.len(), "Channel unsubscribed");
        }
    }
}

#[async_trait]
impl Publisher for InMemoryMessageBus {
    async fn publish_frame(&self, channel: &str, frame: String) -> DeliveryReport {
        self.frames_published.fetch_add(1, Ordering::Relaxed);

        // Snapshot; the lock is released before any handler runs
        let handlers: Vec<FrameHandler> = self
            .registry
            .read()
            .get(channel)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(channel = %channel, "Frame published (no subscribers)");
            return DeliveryReport::empty(channel);
        }

        let frame: Arc<str> = Arc::from(frame);
        let tasks = handlers
            .iter()
            .map(|handler| tokio::spawn((handler.as_ref())(Arc::clone(&frame))));
        let results = join_all(tasks).await;

        let mut failed = 0;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    let error = format!("{e:#}");
                    warn!(channel = %channel, handler = index, error = %error, "Handler failed");
                }
                Err(join_error) => {
                    failed += 1;
                    error!(channel = %channel, handler = index, error = %join_error, "Handler panicked or was cancelled");
                }
            }
        }

        if failed > 0 {
            self.handler_failures
                .fetch_add(failed as u64, Ordering::Relaxed);
        }

        debug!(
            channel = %channel,
            handlers = handlers.len(),
            failed = failed,
            "Frame published"
        );

        DeliveryReport {
            channel: channel.to_string(),
            handlers: handlers.len(),
            failed,
        }
    }
}
