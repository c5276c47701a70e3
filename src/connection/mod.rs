//! Connection management for the bridge
//!
//! This module handles:
//! - The receive loop over a datagram transport
//! - Authorizing the single controller peer by host
//! - Learning and following the peer's reply endpoint
//! - Draining running handlers on shutdown

mod manager;
mod peer;

pub use manager::{BridgeConfig, ConnectionEvent, ConnectionManager};
pub use peer::PeerRegistry;
