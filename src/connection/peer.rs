//! Peer registry: the single authorized controller and where to reply to it

use std::net::{IpAddr, SocketAddr};
use tokio::sync::RwLock;

/// Outcome of recording an inbound source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerUpdate {
    /// First accepted datagram; replies now have a destination
    Established(SocketAddr),
    /// Same host, new port; replies follow the new endpoint
    Moved { from: SocketAddr, to: SocketAddr },
    /// Same endpoint as before
    Unchanged,
    /// Source host is not the configured peer; nothing recorded
    Rejected,
}

/// Tracks the authorized peer host and the learned reply endpoint
///
/// The poll loop is the only writer; handler tasks read the endpoint when they
/// send.
#[derive(Debug)]
pub struct PeerRegistry {
    peer_host: IpAddr,
    reply_endpoint: RwLock<Option<SocketAddr>>,
}

impl PeerRegistry {
    pub fn new(peer_host: IpAddr) -> Self {
        Self {
            peer_host: peer_host.to_canonical(),
            reply_endpoint: RwLock::new(None),
        }
    }

    pub fn peer_host(&self) -> IpAddr {
        self.peer_host
    }

    /// Whether `source` comes from the configured peer host (port is ignored)
    pub fn is_authorized(&self, source: SocketAddr) -> bool {
        source.ip().to_canonical() == self.peer_host
    }

    /// Record `source` as the reply endpoint, overwriting any previous one
    pub async fn learn(&self, source: SocketAddr) -> PeerUpdate {
        if !self.is_authorized(source) {
            return PeerUpdate::Rejected;
        }

        let mut endpoint = self.reply_endpoint.write().await;
        match endpoint.replace(source) {
            None => PeerUpdate::Established(source),
            Some(previous) if previous == source => PeerUpdate::Unchanged,
            Some(previous) => PeerUpdate::Moved {
                from: previous,
                to: source,
            },
        }
    }

    /// Where replies go; `None` until the peer has made contact
    pub async fn reply_endpoint(&self) -> Option<SocketAddr> {
        *self.reply_endpoint.read().await
    }
}
