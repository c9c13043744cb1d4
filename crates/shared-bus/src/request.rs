//! # Correlated Request/Reply
//!
//! Request/response over plain publish/subscribe.
//!
//! Flow:
//! 1. Generate a fresh [`CorrelationId`]
//! 2. Derive `{request channel}.Responses.{correlation id}`
//! 3. Subscribe to that channel; the first matching response resolves the exchange
//! 4. Publish the [`Request`] (carrying the id and reply channel)
//! 5. Await the response until the deadline
//! 6. Unsubscribe from the response channel, on every path
//!
//! At most one responder is expected per correlation id. If several answer,
//! the first response wins and the rest are dropped.

use crate::error::BusError;
use crate::publisher::{Publisher, PublisherExt};
use crate::subscriber::{Subscriber, SubscriberExt};
use crate::CORRELATION_HEADER;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::channels::response_channel;
use shared_types::{CorrelationId, Envelope};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Request wire type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request<T> {
    pub correlation_id: CorrelationId,
    /// Channel the responder must publish the [`Response`] to.
    pub reply_to: String,
    pub body: T,
}

/// Response wire type. `correlation_id` echoes the request's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T> {
    pub correlation_id: CorrelationId,
    pub body: T,
}

/// Counters for a [`RequestClient`].
#[derive(Debug, Default)]
pub struct RequestStats {
    /// Requests published
    pub sent: AtomicU64,
    /// Requests resolved with a response
    pub completed: AtomicU64,
    /// Requests that hit their deadline
    pub timed_out: AtomicU64,
}

/// Issues correlated requests over a bus.
pub struct RequestClient<B: ?Sized> {
    bus: Arc<B>,
    default_timeout: Duration,
    stats: Arc<RequestStats>,
}

impl<B> RequestClient<B>
where
    B: Publisher + Subscriber + ?Sized + 'static,
{
    /// Create a client with a default deadline.
    pub fn new(bus: Arc<B>, default_timeout: Duration) -> Self {
        Self {
            bus,
            default_timeout,
            stats: Arc::new(RequestStats::default()),
        }
    }

    /// The deadline used by [`RequestClient::request`].
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Get statistics
    pub fn stats(&self) -> &RequestStats {
        &self.stats
    }

    /// Send `body` on `request_channel` and await the response with the
    /// default deadline.
    ///
    /// # Errors
    ///
    /// See [`RequestClient::request_with_timeout`].
    pub async fn request<TReq, TResp>(
        &self,
        request_channel: &str,
        body: TReq,
    ) -> Result<TResp, BusError>
    where
        TReq: Serialize + Send,
        TResp: DeserializeOwned + Send + 'static,
    {
        self.request_with_timeout(request_channel, body, self.default_timeout)
            .await
    }

    /// Send `body` on `request_channel` and await the response.
    ///
    /// The request is delivered in a detached task; the deadline covers
    /// only the wait for the first matching response.
    ///
    /// # Errors
    ///
    /// - [`BusError::Timeout`] if no response arrives within `timeout`
    /// - [`BusError::Serialization`] if the request cannot be serialized
    /// - [`BusError::Closed`] if the response channel was unsubscribed externally
    pub async fn request_with_timeout<TReq, TResp>(
        &self,
        request_channel: &str,
        body: TReq,
        timeout: Duration,
    ) -> Result<TResp, BusError>
    where
        TReq: Serialize + Send,
        TResp: DeserializeOwned + Send + 'static,
    {
        let correlation_id = CorrelationId::new();
        let reply_to = response_channel(request_channel, &correlation_id);
        let started = Instant::now();

        let (tx, rx) = oneshot::channel::<TResp>();
        let pending = Arc::new(Mutex::new(Some(tx)));

        self.bus.subscribe(&reply_to, move |response: Response<TResp>| {
            let pending = Arc::clone(&pending);
            async move {
                if response.correlation_id != correlation_id {
                    debug!(
                        expected = %correlation_id,
                        received = %response.correlation_id,
                        "Ignoring response for another exchange"
                    );
                    return Ok(());
                }
                let sender = pending.lock().take();
                match sender {
                    Some(sender) => {
                        // Receiver gone means the requester already gave up
                        let _ = sender.send(response.body);
                    }
                    None => {
                        debug!(correlation_id = %correlation_id, "Duplicate response dropped");
                    }
                }
                Ok(())
            }
        });
        let _subscription = ResponseSubscription {
            bus: Arc::clone(&self.bus),
            channel: reply_to.clone(),
        };

        let request = Envelope::new(Request {
            correlation_id,
            reply_to: reply_to.clone(),
            body,
        })
        .with_header(CORRELATION_HEADER, correlation_id.to_string());

        let frame = request.to_json()?;

        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %correlation_id,
            channel = %request_channel,
            "Request sent"
        );

        // Detached; the deadline covers only the response wait
        let bus = Arc::clone(&self.bus);
        let channel = request_channel.to_string();
        tokio::spawn(async move {
            let report = bus.publish_frame(&channel, frame).await;
            if report.handlers == 0 {
                debug!(channel = %channel, "Request published with no responders");
            }
        });

        let exchange = async {
            rx.await.map_err(|_| BusError::Closed {
                channel: reply_to.clone(),
            })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    response_time_ms = started.elapsed().as_millis(),
                    "Request completed"
                );
                Ok(response)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(
                    correlation_id = %correlation_id,
                    channel = %request_channel,
                    timeout_ms = timeout.as_millis(),
                    "Request timed out"
                );
                Err(BusError::Timeout {
                    correlation_id,
                    timeout,
                })
            }
        }
    }
}

/// Unsubscribes the ephemeral response channel when dropped, including
/// when the requesting future itself is dropped.
struct ResponseSubscription<B: Subscriber + ?Sized> {
    bus: Arc<B>,
    channel: String,
}

impl<B: Subscriber + ?Sized> Drop for ResponseSubscription<B> {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.channel);
    }
}

/// Answer requests arriving on `request_channel`.
///
/// Each [`Request`] body is passed to `handler`; its result is published as
/// a [`Response`] on the request's `reply_to` channel. A handler error is a
/// handler failure on the bus and produces no response, so the requester
/// times out.
pub fn serve<B, TReq, TResp, F, Fut>(bus: &Arc<B>, request_channel: &str, handler: F)
where
    B: Publisher + Subscriber + ?Sized + 'static,
    TReq: DeserializeOwned + Send + 'static,
    TResp: Serialize + Send + 'static,
    F: Fn(TReq) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<TResp>> + Send + 'static,
{
    // Weak: the handler lives inside the bus it publishes to
    let publisher = Arc::downgrade(bus);
    let handler = Arc::new(handler);

    bus.subscribe(request_channel, move |request: Request<TReq>| {
        let publisher = publisher.clone();
        let handler = Arc::clone(&handler);
        async move {
            let Request {
                correlation_id,
                reply_to,
                body,
            } = request;
            let body = (*handler)(body).await?;

            let Some(publisher) = publisher.upgrade() else {
                debug!(correlation_id = %correlation_id, "Bus dropped before response");
                return Ok(());
            };
            let response = Envelope::new(Response {
                correlation_id,
                body,
            })
            .with_header(CORRELATION_HEADER, correlation_id.to_string());
            publisher.publish_envelope(&reply_to, response).await?;
            Ok(())
        }
    });
    debug!(channel = %request_channel, "Responder registered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryMessageBus;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Add {
        a: i64,
        b: i64,
    }

    fn pending_response_channels(bus: &InMemoryMessageBus) -> Vec<String> {
        bus.channels()
            .into_iter()
            .filter(|c| c.contains(".Responses."))
            .collect()
    }

    #[tokio::test]
    async fn test_request_resolves_with_response() {
        let bus = Arc::new(InMemoryMessageBus::new());
        serve(&bus, "Queries.Add", |req: Add| async move { Ok(req.a + req.b) });

        let client = RequestClient::new(Arc::clone(&bus), Duration::from_secs(1));
        let sum: i64 = client.request("Queries.Add", Add { a: 2, b: 40 }).await.unwrap();

        assert_eq!(sum, 42);
        assert_eq!(client.stats().completed.load(Ordering::Relaxed), 1);
        assert!(pending_response_channels(&bus).is_empty());
    }

    #[tokio::test]
    async fn test_request_times_out_without_responder() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let client = RequestClient::new(Arc::clone(&bus), Duration::from_secs(5));

        let started = Instant::now();
        let result: Result<i64, BusError> = client
            .request_with_timeout("Queries.Nobody", Add { a: 1, b: 1 }, Duration::from_millis(500))
            .await;
        let elapsed = started.elapsed();

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_millis(450), "timed out early: {elapsed:?}");
        match err {
            BusError::Timeout { timeout, .. } => assert_eq!(timeout, Duration::from_millis(500)),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(client.stats().timed_out.load(Ordering::Relaxed), 1);
        assert!(pending_response_channels(&bus).is_empty());
    }

    #[tokio::test]
    async fn test_slow_bystander_does_not_delay_response() {
        let bus = Arc::new(InMemoryMessageBus::new());
        serve(&bus, "Queries.Inc", |n: i64| async move { Ok(n + 1) });
        bus.subscribe("Queries.Inc", |_: Request<i64>| async move {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            Ok(())
        });

        let client = RequestClient::new(Arc::clone(&bus), Duration::from_secs(5));
        let started = Instant::now();
        let result: Result<i64, BusError> = client
            .request_with_timeout("Queries.Inc", 1i64, Duration::from_millis(500))
            .await;

        assert_eq!(result.unwrap(), 2);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(pending_response_channels(&bus).is_empty());
    }

    #[tokio::test]
    async fn test_failing_responder_times_out_and_cleans_up() {
        let bus = Arc::new(InMemoryMessageBus::new());
        serve(&bus, "Queries.Broken", |_: Add| async move {
            Err::<i64, _>(anyhow::anyhow!("backend down"))
        });

        let client = RequestClient::new(Arc::clone(&bus), Duration::from_millis(200));
        let result: Result<i64, BusError> = client.request("Queries.Broken", Add { a: 0, b: 0 }).await;

        assert!(result.unwrap_err().is_timeout());
        assert!(pending_response_channels(&bus).is_empty());
        assert_eq!(bus.handler_failures(), 1);
    }

    #[tokio::test]
    async fn test_first_response_wins() {
        let bus = Arc::new(InMemoryMessageBus::new());
        serve(&bus, "Queries.Twice", |_: Add| async move { Ok("first") });
        serve(&bus, "Queries.Twice", |_: Add| async move { Ok("second") });

        let client = RequestClient::new(Arc::clone(&bus), Duration::from_secs(1));
        let answer: String = client.request("Queries.Twice", Add { a: 0, b: 0 }).await.unwrap();

        assert!(answer == "first" || answer == "second");
        assert_eq!(bus.handler_failures(), 0);
        assert!(pending_response_channels(&bus).is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_correlation_id_is_ignored() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let responder = Arc::downgrade(&bus);
        bus.subscribe("Queries.Liar", move |req: Request<Add>| {
            let responder = responder.clone();
            async move {
                if let Some(bus) = responder.upgrade() {
                    let forged = Response {
                        correlation_id: CorrelationId::new(),
                        body: 0i64,
                    };
                    bus.publish(&req.reply_to, forged).await?;
                }
                Ok(())
            }
        });

        let client = RequestClient::new(Arc::clone(&bus), Duration::from_millis(200));
        let result: Result<i64, BusError> = client.request("Queries.Liar", Add { a: 1, b: 2 }).await;

        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_request_carries_correlation_id_and_header() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        bus.subscribe("Queries.Echo", move |frame: serde_json::Value| {
            let tx = tx.clone();
            async move {
                tx.send(frame)?;
                Ok(())
            }
        });
        // Raw frame subscriber to inspect headers
        let (frame_tx, mut frame_rx) = tokio::sync::mpsc::unbounded_channel();
        bus.subscribe_frame(
            "Queries.Echo",
            Arc::new(move |frame: Arc<str>| -> crate::HandlerFuture {
                let frame_tx = frame_tx.clone();
                Box::pin(async move {
                    frame_tx.send(frame.to_string())?;
                    Ok(())
                })
            }),
        );

        let client = RequestClient::new(Arc::clone(&bus), Duration::from_millis(50));
        let _: Result<i64, BusError> = client.request("Queries.Echo", Add { a: 1, b: 2 }).await;

        let request = rx.recv().await.unwrap();
        let correlation_id = request["correlation_id"].as_str().unwrap().to_string();
        assert_eq!(
            request["reply_to"],
            json!(format!("Queries.Echo.Responses.{correlation_id}"))
        );
        assert_eq!(request["body"], json!({ "a": 1, "b": 2 }));

        let envelope: Envelope<serde_json::Value> =
            Envelope::from_json(&frame_rx.recv().await.unwrap()).unwrap();
        assert_eq!(envelope.header(CORRELATION_HEADER), Some(correlation_id.as_str()));
    }

    #[tokio::test]
    async fn test_dropped_request_future_unsubscribes() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let client = RequestClient::new(Arc::clone(&bus), Duration::from_secs(10));

        let outer = tokio::time::timeout(
            Duration::from_millis(50),
            client.request::<_, i64>("Queries.Slow", Add { a: 0, b: 0 }),
        )
        .await;

        assert!(outer.is_err());
        assert!(pending_response_channels(&bus).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let bus = Arc::new(InMemoryMessageBus::new());
        serve(&bus, "Queries.Double", |n: i64| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(n * 2)
        });

        let client = Arc::new(RequestClient::new(Arc::clone(&bus), Duration::from_secs(1)));
        let mut tasks = Vec::new();
        for n in 0..20i64 {
            let client = Arc::clone(&client);
            tasks.push(tokio::spawn(async move {
                let doubled: i64 = client.request("Queries.Double", n).await.unwrap();
                (n, doubled)
            }));
        }

        for task in tasks {
            let (n, doubled) = task.await.unwrap();
            assert_eq!(doubled, n * 2);
        }
        assert!(pending_response_channels(&bus).is_empty());
    }
}
