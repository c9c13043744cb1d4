//! # UDP Packet Receiver
//!
//! One datagram is one packet buffer.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{info, trace};

use super::receiver::{PacketReceiver, ReceiveError};
use crate::shutdown::ShutdownSignal;

/// Packet source reading datagrams from a bound UDP socket.
pub struct UdpPacketReceiver {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

impl UdpPacketReceiver {
    /// Bind to `addr`. Datagrams longer than `max_datagram_size` are truncated
    /// by the socket, which the decoder then rejects.
    pub async fn bind(addr: SocketAddr, max_datagram_size: usize) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(addr = %socket.local_addr()?, "UDP packet receiver bound");
        Ok(Self {
            socket,
            buffer: vec![0u8; max_datagram_size],
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl PacketReceiver for UdpPacketReceiver {
    async fn receive_next(&mut self, shutdown: &mut ShutdownSignal) -> Result<Vec<u8>, ReceiveError> {
        if shutdown.is_triggered() {
            return Err(ReceiveError::Cancelled);
        }

        let received = tokio::select! {
            biased;
            _ = shutdown.triggered() => return Err(ReceiveError::Cancelled),
            received = self.socket.recv_from(&mut self.buffer) => received,
        };

        let (len, peer) = received?;
        trace!(peer = %peer, bytes = len, "Datagram received");
        Ok(self.buffer[..len].to_vec())
    }
}
