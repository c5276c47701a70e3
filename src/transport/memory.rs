//! In-memory datagram transport for driving the bridge in tests

use crate::transport::traits::{Datagram, DatagramTransport};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use robot_bridge_shared::{codec, ResponseEnvelope};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

/// Bridge side of the in-memory link
pub struct MemoryTransport {
    local: SocketAddr,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Datagram>>,
    outbound_tx: mpsc::UnboundedSender<(SocketAddr, Bytes)>,
}

/// Test side of the in-memory link: injects datagrams and collects sends
pub struct MemoryPeer {
    inbound_tx: mpsc::UnboundedSender<Datagram>,
    outbound_rx: mpsc::UnboundedReceiver<(SocketAddr, Bytes)>,
}

/// Create a connected transport/peer pair
pub fn pair(local: SocketAddr) -> (MemoryTransport, MemoryPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    (
        MemoryTransport {
            local,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
        },
        MemoryPeer {
            inbound_tx,
            outbound_rx,
        },
    )
}

#[async_trait]
impl DatagramTransport for MemoryTransport {
    async fn recv(&self, wait: Duration) -> Result<Option<Datagram>> {
        let mut rx = self.inbound_rx.lock().await;
        match timeout(wait, rx.recv()).await {
            Ok(Some(datagram)) => Ok(Some(datagram)),
            Ok(None) => {
                // Peer dropped; behave like an idle socket
                drop(rx);
                tokio::time::sleep(wait).await;
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<()> {
        self.outbound_tx
            .send((dest, Bytes::copy_from_slice(payload)))
            .map_err(|_| anyhow!("memory link closed"))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local)
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

impl MemoryPeer {
    /// Deliver raw bytes to the bridge as if sent from `source`
    pub fn inject(&self, source: SocketAddr, payload: impl AsRef<[u8]>) {
        let _ = self.inbound_tx.send(Datagram {
            payload: Bytes::copy_from_slice(payload.as_ref()),
            source,
        });
    }

    /// Next datagram the bridge sent, decoded as a response
    pub async fn next_response(&mut self, wait: Duration) -> Option<(SocketAddr, ResponseEnvelope)> {
        let (dest, bytes) = timeout(wait, self.outbound_rx.recv()).await.ok()??;
        let response = codec::decode_response(&bytes).expect("bridge sent an undecodable response");
        Some((dest, response))
    }

    /// Collect every response that arrives within `wait`
    pub async fn drain(&mut self, wait: Duration) -> Vec<(SocketAddr, ResponseEnvelope)> {
        let mut out = Vec::new();
        while let Some(item) = self.next_response(wait).await {
            out.push(item);
        }
        out
    }
}
