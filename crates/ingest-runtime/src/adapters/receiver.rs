//! # Packet Receiver Port
//!
//! The ingest loop pulls raw packets through [`PacketReceiver`]. The
//! in-memory source models a socket as an unbounded queue with blocking
//! reads.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::shutdown::ShutdownSignal;

/// Receive failures.
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The shutdown signal was set. Normal termination, not a failure.
    #[error("receive cancelled")]
    Cancelled,

    /// The source can never produce another packet.
    #[error("packet source closed")]
    Closed,

    /// A transient I/O failure on the source.
    #[error("receive failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of raw packet buffers.
#[async_trait]
pub trait PacketReceiver: Send {
    /// Block until the next packet arrives or `shutdown` is set.
    ///
    /// Once `shutdown` is set, returns [`ReceiveError::Cancelled`] instead
    /// of a packet, even if packets are queued.
    async fn receive_next(&mut self, shutdown: &mut ShutdownSignal) -> Result<Vec<u8>, ReceiveError>;
}

/// Producer half of the in-memory source.
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl PacketSender {
    /// Queue a raw packet. Returns `false` if the receiver is gone.
    pub fn send(&self, packet: Vec<u8>) -> bool {
        self.tx.send(packet).is_ok()
    }
}

/// Consumer half of the in-memory source.
#[derive(Debug)]
pub struct InMemoryPacketReceiver {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Create a connected in-memory packet source.
pub fn in_memory_source() -> (PacketSender, InMemoryPacketReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PacketSender { tx }, InMemoryPacketReceiver { rx })
}

#[async_trait]
impl PacketReceiver for InMemoryPacketReceiver {
    async fn receive_next(&mut self, shutdown: &mut ShutdownSignal) -> Result<Vec<u8>, ReceiveError> {
        if shutdown.is_triggered() {
            return Err(ReceiveError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = shutdown.triggered() => Err(ReceiveError::Cancelled),
            packet = self.rx.recv() => packet.ok_or(ReceiveError::Closed),
        }
    }
}
