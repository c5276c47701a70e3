//! Transport trait abstraction for pluggable datagram backends

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;

/// One received datagram and its source endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Datagram {
    pub payload: Bytes,
    pub source: SocketAddr,
}

/// A bound, connectionless transport shared by the poll loop and handler tasks
#[async_trait]
pub trait DatagramTransport: Send + Sync + 'static {
    /// Wait at most `wait` for one datagram
    ///
    /// Returns `Ok(None)` when nothing arrived in time so the caller can re-poll.
    async fn recv(&self, wait: Duration) -> Result<Option<Datagram>>;

    /// Send one datagram; no delivery confirmation and no retry
    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<()>;

    /// Address the transport is bound to
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
