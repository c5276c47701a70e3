//! Reply path from handler tasks back to the peer

use crate::connection::PeerRegistry;
use crate::transport::DatagramTransport;
use robot_bridge_shared::{codec, ResponseEnvelope};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Sends responses to the learned peer endpoint
///
/// Cheap to clone; every handler task gets its own copy. Concurrent sends share
/// the transport without extra locking since each datagram is written whole.
#[derive(Clone)]
pub struct ReplySink {
    transport: Arc<dyn DatagramTransport>,
    peers: Arc<PeerRegistry>,
}

impl ReplySink {
    pub fn new(transport: Arc<dyn DatagramTransport>, peers: Arc<PeerRegistry>) -> Self {
        Self { transport, peers }
    }

    /// Send one response; returns whether it left the socket
    ///
    /// Never fails the caller: a missing endpoint, an encode error or a send
    /// error is logged and the response is dropped.
    pub async fn send(&self, response: &ResponseEnvelope) -> bool {
        let Some(dest) = self.peers.reply_endpoint().await else {
            warn!(
                "[BRIDGE] Peer address not set, dropping {} response for '{}'",
                response.status, response.command
            );
            return false;
        };

        let payload = match codec::encode(response) {
            Ok(payload) => payload,
            Err(e) => {
                error!("[BRIDGE] Failed to encode response for '{}': {}", response.command, e);
                return false;
            }
        };

        match self.transport.send_to(&payload, dest).await {
            Ok(()) => {
                debug!(
                    command = %response.command,
                    status = %response.status,
                    %dest,
                    "[BRIDGE -> PEER] response sent"
                );
                true
            }
            Err(e) => {
                warn!("[BRIDGE] Error sending to peer {}: {:#}", dest, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory;
    use std::net::SocketAddr;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_without_peer_is_dropped() {
        let (transport, mut peer) = memory::pair("0.0.0.0:5005".parse().unwrap());
        let registry = Arc::new(PeerRegistry::new("10.0.0.2".parse().unwrap()));
        let sink = ReplySink::new(Arc::new(transport), registry);

        assert!(!sink.send(&ResponseEnvelope::success("ping")).await);
        assert!(peer.next_response(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn test_send_goes_to_learned_endpoint() {
        let (transport, mut peer) = memory::pair("0.0.0.0:5005".parse().unwrap());
        let registry = Arc::new(PeerRegistry::new("10.0.0.2".parse().unwrap()));
        let source: SocketAddr = "10.0.0.2:41000".parse().unwrap();
        registry.learn(source).await;

        let sink = ReplySink::new(Arc::new(transport), registry);
        assert!(sink.send(&ResponseEnvelope::success("ping")).await);

        let (dest, response) = peer
            .next_response(Duration::from_millis(100))
            .await
            .expect("nothing sent");
        assert_eq!(dest, source);
        assert_eq!(response.command, "ping");
    }
}
