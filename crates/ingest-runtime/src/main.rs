//! # Telemetry Relay
//!
//! Listens for packets on UDP and relays decoded telemetry over the
//! message bus until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Install logging
//! 3. Build the runtime (bus, persistence, broadcast relay, statistics)
//! 4. Bind the UDP receiver and start the ingest loop
//! 5. Wait for Ctrl+C, then drain and stop

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use ingest_runtime::adapters::{TracingBroadcast, TracingEventSink, UdpPacketReceiver};
use ingest_runtime::logging::init_logging;
use ingest_runtime::{RelayRuntime, RuntimeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::from_env().context("invalid configuration")?;
    init_logging(&config.logging).context("failed to initialize logging")?;

    info!("===========================================");
    info!("  Telemetry Relay v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let receiver = UdpPacketReceiver::bind(
        config.ingest.bind_addr,
        config.ingest.max_datagram_size,
    )
    .await
    .with_context(|| format!("failed to bind {}", config.ingest.bind_addr))?;

    let runtime = RelayRuntime::new(config, Arc::new(TracingEventSink), Arc::new(TracingBroadcast));
    let ingest = runtime.spawn_ingest(receiver);

    info!("Relay is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown();
    match ingest.await {
        Ok(stats) => info!(
            received = stats.received,
            published = stats.published,
            rejected = stats.rejected,
            "Ingest finished"
        ),
        Err(e) => warn!(error = %e, "Ingest task ended abnormally"),
    }
    runtime.bus().shutdown();

    Ok(())
}
