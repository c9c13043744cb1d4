//! # Relay Runtime
//!
//! Owns the bus and wires every handler onto it:
//!
//! ```text
//!  PacketReceiver ──→ IngestPipeline ──→ Telemetry.{apid} ──→ BroadcastRelay
//!                          │
//!                          └──→ Events.PacketRejected ──→ EventPersistence
//!
//!  Queries.* / Commands.* ──→ StatsService ──→ Events.IngestStatsReset
//! ```

use shared_bus::{InMemoryMessageBus, RequestClient};
use shared_types::channels::channel_for_application_id;
use shared_types::IngestStats;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapters::{BroadcastTransport, EventSink, PacketReceiver};
use crate::container::RuntimeConfig;
use crate::handlers::{BroadcastRelay, EventPersistence, StatsService};
use crate::ingest::{IngestPipeline, IngestState};
use crate::shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};

/// The assembled relay.
pub struct RelayRuntime {
    config: RuntimeConfig,
    bus: Arc<InMemoryMessageBus>,
    state: Arc<IngestState>,
    persistence: Arc<EventPersistence>,
    relay: Arc<BroadcastRelay>,
    requests: RequestClient<InMemoryMessageBus>,
    shutdown: ShutdownTrigger,
}

impl RelayRuntime {
    /// Create the bus and attach persistence, the broadcast relay and the
    /// statistics service.
    pub fn new(
        config: RuntimeConfig,
        sink: Arc<dyn EventSink>,
        broadcast: Arc<dyn BroadcastTransport>,
    ) -> Self {
        info!("Creating telemetry relay runtime");

        let bus = Arc::new(InMemoryMessageBus::new());
        let state = Arc::new(IngestState::new());

        let persistence = EventPersistence::attach(bus.as_ref(), sink);
        let relayed = config
            .broadcast
            .application_ids
            .iter()
            .map(|apid| channel_for_application_id(*apid))
            .collect();
        let relay = BroadcastRelay::attach(bus.as_ref(), broadcast, relayed);
        StatsService::register(&bus, Arc::clone(&state));

        let requests = RequestClient::new(Arc::clone(&bus), config.request.timeout());
        let (shutdown, _) = shutdown_channel();

        Self {
            config,
            bus,
            state,
            persistence,
            relay,
            requests,
            shutdown,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<InMemoryMessageBus> {
        &self.bus
    }

    pub fn state(&self) -> &Arc<IngestState> {
        &self.state
    }

    pub fn persistence(&self) -> &EventPersistence {
        &self.persistence
    }

    pub fn relay(&self) -> &BroadcastRelay {
        &self.relay
    }

    /// Client for queries against this runtime's bus.
    pub fn requests(&self) -> &RequestClient<InMemoryMessageBus> {
        &self.requests
    }

    /// A new observer of the runtime's shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Start the ingest loop on `receiver`.
    pub fn spawn_ingest<R>(&self, receiver: R) -> JoinHandle<IngestStats>
    where
        R: PacketReceiver + 'static,
    {
        let pipeline = IngestPipeline::new(receiver, Arc::clone(&self.bus), Arc::clone(&self.state));
        tokio::spawn(pipeline.run(self.shutdown.signal()))
    }

    /// Signal every ingest loop to stop. Their next receive returns
    /// cancellation.
    pub fn shutdown(&self) {
        info!("Shutting down telemetry relay");
        self.shutdown.trigger();
    }
}
