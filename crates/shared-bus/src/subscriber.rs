//! # Subscriber
//!
//! Defines the subscription side of the bus.

use anyhow::Context as _;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use shared_types::Envelope;
use std::future::Future;
use std::sync::Arc;

/// Result of one handler invocation.
pub type HandlerResult = anyhow::Result<()>;

/// Future returned by a frame handler.
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// A registered handler. Receives the raw envelope frame.
pub type FrameHandler = Arc<dyn Fn(Arc<str>) -> HandlerFuture + Send + Sync>;

/// Object-safe subscription capability.
pub trait Subscriber: Send + Sync {
    /// Register `handler` on `channel`. Existing handlers are kept.
    fn subscribe_frame(&self, channel: &str, handler: FrameHandler);

    /// Remove **every** handler registered on `channel`.
    ///
    /// Unsubscribing an unknown channel is a no-op.
    fn unsubscribe(&self, channel: &str);
}

/// Typed subscription on top of [`Subscriber`].
pub trait SubscriberExt: Subscriber {
    /// Register a handler that receives payloads deserialized as `T`.
    ///
    /// A frame whose payload is not a `T` fails this handler only.
    fn subscribe<T, F, Fut>(&self, channel: &str, handler: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let frame_handler: FrameHandler = Arc::new(move |frame: Arc<str>| -> HandlerFuture {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let envelope: Envelope<T> = Envelope::from_json(&frame).with_context(|| {
                    format!("payload is not a {}", std::any::type_name::<T>())
                })?;
                (*handler)(envelope.payload).await
            })
        });
        self.subscribe_frame(channel, frame_handler);
    }
}

impl<S: Subscriber + ?Sized> SubscriberExt for S {}
