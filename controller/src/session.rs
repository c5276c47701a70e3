//! Controller side of the link to one bridge

use anyhow::{Context, Result};
use robot_bridge_shared::{codec, limits, CommandEnvelope, ResponseEnvelope};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// A UDP socket talking to a single bridge
pub struct BridgeSession {
    socket: UdpSocket,
    bridge: SocketAddr,
    read_buf: Vec<u8>,
}

impl BridgeSession {
    /// Bind `bind` and address all commands to `bridge`
    pub async fn open(bind: SocketAddr, bridge: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(bind)
            .await
            .with_context(|| format!("failed to bind {}", bind))?;
        Ok(Self {
            socket,
            bridge,
            read_buf: vec![0u8; limits::MAX_DATAGRAM_SIZE],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn bridge(&self) -> SocketAddr {
        self.bridge
    }

    /// Send one command to the bridge
    pub async fn send(&self, command: &CommandEnvelope) -> Result<()> {
        let payload = codec::encode_command(command)?;
        self.socket
            .send_to(&payload, self.bridge)
            .await
            .with_context(|| format!("failed to send to {}", self.bridge))?;
        debug!(command = %command.command, bridge = %self.bridge, "command sent");
        Ok(())
    }

    /// Next response from the bridge, or `None` if nothing arrives within `wait`
    ///
    /// Datagrams from other hosts and datagrams that do not decode are skipped.
    pub async fn recv(&mut self, wait: Duration) -> Result<Option<ResponseEnvelope>> {
        let deadline = Instant::now() + wait;

        loop {
            let (n, source) = match timeout_at(deadline, self.socket.recv_from(&mut self.read_buf)).await {
                Ok(result) => result.context("receive failed")?,
                Err(_) => return Ok(None),
            };

            if source.ip().to_canonical() != self.bridge.ip().to_canonical() {
                debug!("Ignoring datagram from {}", source);
                continue;
            }

            match codec::decode_response(&self.read_buf[..n]) {
                Ok(response) => return Ok(Some(response)),
                Err(e) => warn!("Ignoring undecodable datagram from {}: {}", source, e),
            }
        }
    }
}
