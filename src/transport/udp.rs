//! UDP transport implementation for the controller peer link

use crate::transport::traits::{Datagram, DatagramTransport};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::BytesMut;
use robot_bridge_shared::limits::MAX_DATAGRAM_SIZE;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// UDP socket wrapper implementing DatagramTransport
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind a socket on the given local address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("failed to bind UDP socket on {}", addr))?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn recv(&self, wait: Duration) -> Result<Option<Datagram>> {
        let mut buf = BytesMut::zeroed(MAX_DATAGRAM_SIZE);

        match timeout(wait, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, source))) => {
                buf.truncate(len);
                Ok(Some(Datagram {
                    payload: buf.freeze(),
                    source,
                }))
            }
            Ok(Err(e)) => Err(anyhow!("UDP receive failed: {}", e)),
            // Timeout is the normal idle case
            Err(_) => Ok(None),
        }
    }

    async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<()> {
        let sent = self
            .socket
            .send_to(payload, dest)
            .await
            .with_context(|| format!("UDP send to {} failed", dest))?;
        if sent != payload.len() {
            return Err(anyhow!(
                "UDP send to {} truncated: {} of {} bytes",
                dest,
                sent,
                payload.len()
            ));
        }
        Ok(())
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn name(&self) -> &'static str {
        "UDP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn loopback() -> UdpTransport {
        UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind failed")
    }

    #[tokio::test]
    async fn test_recv_times_out_with_no_data() {
        let transport = loopback().await;
        let result = transport
            .recv(Duration::from_millis(20))
            .await
            .expect("recv failed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_send_and_receive_reports_source() {
        let a = loopback().await;
        let b = loopback().await;

        a.send_to(br#"{"command":"ping"}"#, b.local_addr().unwrap())
            .await
            .expect("send failed");

        let datagram = b
            .recv(Duration::from_secs(2))
            .await
            .expect("recv failed")
            .expect("no datagram");
        assert_eq!(&datagram.payload[..], br#"{"command":"ping"}"#);
        assert_eq!(datagram.source, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_transport_name() {
        assert_eq!(loopback().await.name(), "UDP");
    }
}
