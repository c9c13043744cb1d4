//! # Shared Bus - In-Process Message Bus
//!
//! Channel-keyed publish/subscribe with per-handler fault isolation, plus a
//! correlated request/reply protocol layered on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Publisher   │                    │  Handler(s)  │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │  Envelope<T> JSON frame,
//!                  │ Message Bus  │ ─────────┘  deserialized per handler
//!                  │  (registry)  │  subscribe()
//!                  └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Snapshot delivery:** a publish reaches the handlers registered when it started.
//! - **Fault isolation:** a failing or panicking handler never affects other
//!   handlers or the publisher.
//! - **Channel-scoped unsubscribe:** `unsubscribe(channel)` removes every
//!   handler registered under that channel, not a single handler.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod error;
pub mod publisher;
pub mod request;
pub mod subscriber;

// Re-export main types
pub use bus::InMemoryMessageBus;
pub use error::BusError;
pub use publisher::{DeliveryReport, Publisher, PublisherExt};
pub use request::{serve, Request, RequestClient, RequestStats, Response};
pub use subscriber::{FrameHandler, HandlerFuture, HandlerResult, Subscriber, SubscriberExt};

/// Default deadline for correlated requests.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Header carrying the correlation id on request and response envelopes.
pub const CORRELATION_HEADER: &str = "correlation-id";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        assert_eq!(DEFAULT_REQUEST_TIMEOUT_MS, 5_000);
    }
}
