//! Connection manager: the bridge's receive loop
//!
//! One task polls the transport with a short timeout, filters by peer host,
//! learns the reply endpoint, decodes and hands each command to the dispatcher.
//! It never touches the device.

use super::peer::{PeerRegistry, PeerUpdate};
use crate::command::handlers::{HandlerContext, HandshakeTimings, PeerIdentity};
use crate::command::{CommandDispatcher, DispatchConfig, ReplySink};
use crate::device::DeviceHandle;
use crate::transport::{Datagram, DatagramTransport};
use anyhow::{Context, Result};
use robot_bridge_shared::{codec, limits};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events emitted by the connection manager
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Receive loop running
    Listening {
        local: SocketAddr,
        transport: &'static str,
    },
    /// First datagram from the authorized peer; replies now have a destination
    SessionEstablished { peer: SocketAddr },
    /// The peer moved to a new port; replies follow it
    ReplyEndpointChanged { from: SocketAddr, to: SocketAddr },
    /// Datagram from a host other than the configured peer, dropped
    Unauthorized { source: SocketAddr },
    /// Datagram from the peer that did not decode, dropped
    Malformed { source: SocketAddr, reason: String },
    /// Receive loop exited; `drained` is false if handlers outlived the drain timeout
    Stopped { drained: bool },
}

/// Configuration for the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the transport binds
    pub listen_addr: SocketAddr,
    /// Only datagrams from this host are accepted
    pub peer_host: IpAddr,
    /// Receive timeout of each poll
    pub poll_interval: Duration,
    /// How long shutdown waits for running handlers
    pub drain_timeout: Duration,
    pub dispatch: DispatchConfig,
    pub identity: PeerIdentity,
    pub handshake: HandshakeTimings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                limits::DEFAULT_LISTEN_PORT,
            ),
            peer_host: IpAddr::V4(Ipv4Addr::new(192, 168, 123, 162)),
            poll_interval: Duration::from_millis(limits::DEFAULT_POLL_INTERVAL_MS),
            drain_timeout: Duration::from_millis(limits::DEFAULT_DRAIN_TIMEOUT_MS),
            dispatch: DispatchConfig::default(),
            identity: PeerIdentity::default(),
            handshake: HandshakeTimings::default(),
        }
    }
}

/// Runs the receive loop over a bound transport
pub struct ConnectionManager {
    local_addr: SocketAddr,
    /// Channel to receive connection events
    event_rx: mpsc::Receiver<ConnectionEvent>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<bool>,
}

impl ConnectionManager {
    /// Start the receive loop on `transport`
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn DatagramTransport>,
        device: DeviceHandle,
    ) -> Result<Self> {
        let local_addr = transport
            .local_addr()
            .context("transport has no local address")?;
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let peers = Arc::new(PeerRegistry::new(config.peer_host));
        let dispatcher = CommandDispatcher::new(
            config.dispatch.clone(),
            HandlerContext {
                identity: config.identity.clone(),
                device,
                handshake: config.handshake.clone(),
            },
        );
        let reply = ReplySink::new(transport.clone(), peers.clone());

        let state = LoopState {
            poll_interval: config.poll_interval,
            drain_timeout: config.drain_timeout,
            transport,
            peers,
            dispatcher,
            reply,
            event_tx,
        };
        let task = tokio::spawn(poll_loop(state, shutdown_rx));

        Ok(Self {
            local_addr,
            event_rx,
            shutdown_tx,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }

    /// Stop polling, wait for running handlers, then release the transport
    ///
    /// Returns whether every handler finished within the drain timeout.
    pub async fn shutdown(self) -> Result<bool> {
        let _ = self.shutdown_tx.send(true);
        self.task.await.context("receive loop panicked")
    }
}

struct LoopState {
    poll_interval: Duration,
    drain_timeout: Duration,
    transport: Arc<dyn DatagramTransport>,
    peers: Arc<PeerRegistry>,
    dispatcher: CommandDispatcher,
    reply: ReplySink,
    event_tx: mpsc::Sender<ConnectionEvent>,
}

impl LoopState {
    fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!("[BRIDGE] Event dropped: {}", e);
        }
    }

    async fn handle_datagram(&self, datagram: Datagram) {
        let source = datagram.source;

        match self.peers.learn(source).await {
            PeerUpdate::Rejected => {
                warn!("[PEER] Received message from unexpected host: {}", source.ip());
                self.emit(ConnectionEvent::Unauthorized { source });
                return;
            }
            PeerUpdate::Established(peer) => {
                info!("[PEER] Communication established with {}", peer);
                self.emit(ConnectionEvent::SessionEstablished { peer });
            }
            PeerUpdate::Moved { from, to } => {
                info!("[PEER] Reply endpoint moved from {} to {}", from, to);
                self.emit(ConnectionEvent::ReplyEndpointChanged { from, to });
            }
            PeerUpdate::Unchanged => {}
        }

        let envelope = match codec::decode(&datagram.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("[BRIDGE] Dropping datagram from {}: {}", source, e);
                self.emit(ConnectionEvent::Malformed {
                    source,
                    reason: e.to_string(),
                });
                return;
            }
        };

        debug!(command = %envelope.command, %source, "[PEER -> BRIDGE] command received");
        self.dispatcher.dispatch(envelope, self.reply.clone()).await;
    }
}

/// Receive loop; returns whether shutdown drained every handler
async fn poll_loop(state: LoopState, mut shutdown_rx: watch::Receiver<bool>) -> bool {
    match state.transport.local_addr() {
        Ok(local) => {
            info!(
                "[BRIDGE] Listening on {} via {}, accepting peer {}",
                local,
                state.transport.name(),
                state.peers.peer_host()
            );
            state.emit(ConnectionEvent::Listening {
                local,
                transport: state.transport.name(),
            });
        }
        Err(e) => warn!("[BRIDGE] Listening without a local address: {:#}", e),
    }

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // Manager dropped without shutdown
                    break;
                }
            }
            result = state.transport.recv(state.poll_interval) => match result {
                Ok(Some(datagram)) => state.handle_datagram(datagram).await,
                Ok(None) => {}
                Err(e) => {
                    warn!("[BRIDGE] Receive error: {:#}", e);
                    tokio::time::sleep(state.poll_interval).await;
                }
            },
        }
    }

    info!(
        "[BRIDGE] Stopped polling, draining {} handlers",
        state.dispatcher.pending()
    );
    let drained = state.dispatcher.drain(state.drain_timeout).await;
    state.emit(ConnectionEvent::Stopped { drained });
    drained
}
