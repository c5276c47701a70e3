mod command;
mod connection;
mod device;
mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use command::handlers::{HandshakeTimings, PeerIdentity};
use command::{BusyPolicy, DispatchConfig};
use connection::{BridgeConfig, ConnectionEvent, ConnectionManager};
use device::{run_self_test, DeviceHandle, SelfTestConfig, SimulatedDevice, SimulatedTimings};
use robot_bridge_shared::limits;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, Signal, SignalKind};
use transport::UdpTransport;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// UDP/JSON control bridge between a controller peer and the robot
#[derive(Parser, Debug)]
#[command(name = "robot-bridge", version)]
struct Args {
    /// Network interface of the robot link (e.g. eth0)
    network_interface: String,

    /// Host allowed to send commands; everything else is dropped
    authorized_peer_host: IpAddr,

    /// UDP port to listen on
    listen_port: u16,

    /// Handler tasks allowed to run at once
    #[arg(
        long,
        default_value_t = limits::DEFAULT_MAX_IN_FLIGHT as u32,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_in_flight: u32,

    /// What to do when every handler slot is taken: reject or queue
    #[arg(long, default_value = "reject")]
    busy_policy: BusyPolicy,

    /// Receive timeout of the poll loop
    #[arg(long, default_value_t = limits::DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Address reported as the controller's in ping and status replies
    #[arg(long)]
    controller_ip: Option<String>,

    /// Address reported as the robot's in ping and status replies
    #[arg(long)]
    robot_ip: Option<String>,

    /// Greet and say goodbye around the handshake gesture
    #[arg(long)]
    speak: bool,

    /// Run the device self-test and exit
    #[arg(long)]
    self_test: bool,
}

impl Args {
    fn bridge_config(&self) -> BridgeConfig {
        let defaults = PeerIdentity::default();
        BridgeConfig {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.listen_port),
            peer_host: self.authorized_peer_host,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            dispatch: DispatchConfig {
                max_in_flight: usize::try_from(self.max_in_flight).unwrap_or(usize::MAX),
                busy_policy: self.busy_policy,
            },
            identity: PeerIdentity {
                controller_ip: self.controller_ip.clone().unwrap_or(defaults.controller_ip),
                robot_ip: self.robot_ip.clone().unwrap_or(defaults.robot_ip),
            },
            handshake: HandshakeTimings {
                speak: self.speak,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Wait for ctrl-c or SIGTERM; returns the name of the signal
async fn shutdown_requested(terminate: &mut Signal) -> &'static str {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            "SIGINT"
        }
        _ = terminate.recv() => "SIGTERM",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let device = Arc::new(SimulatedDevice::new(
        args.network_interface.as_str(),
        SimulatedTimings::default(),
    ));

    if args.self_test {
        info!("Running device self-test on {}", args.network_interface);
        let report = match run_self_test(device.as_ref(), &SelfTestConfig::default()).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Device calls before the failure: {:?}", device.journal().await);
                return Err(e);
            }
        };
        info!(
            "Self-test passed: {} stages, {} polls ok",
            report.stages_passed.len(),
            report.polls_ok
        );
        return Ok(());
    }

    let config = args.bridge_config();
    info!("Robot bridge starting");
    info!("  Network interface: {}", args.network_interface);
    info!("  Authorized peer: {}", config.peer_host);
    info!("  Listen address: {}", config.listen_addr);
    info!(
        "  Max in flight: {} ({:?} when busy)",
        config.dispatch.max_in_flight, config.dispatch.busy_policy
    );

    let transport = UdpTransport::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    let device = DeviceHandle::new(device);
    info!("  Device: {}", device.name());
    let mut conn = ConnectionManager::new(config, Arc::new(transport), device)?;
    info!("Bound {}", conn.local_addr());

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let shutdown = shutdown_requested(&mut terminate);
    tokio::pin!(shutdown);

    // Main event loop
    loop {
        tokio::select! {
            event = conn.recv() => match event {
                Some(ConnectionEvent::SessionEstablished { peer }) => {
                    info!("Peer {} connected, replies go there", peer);
                }
                Some(ConnectionEvent::ReplyEndpointChanged { to, .. }) => {
                    info!("Replies now go to {}", to);
                }
                Some(ConnectionEvent::Stopped { drained }) => {
                    warn!("Receive loop stopped (drained: {})", drained);
                    break;
                }
                Some(other) => {
                    debug!(event = ?other, "Connection event");
                }
                None => {
                    error!("Connection manager closed");
                    break;
                }
            },
            received = &mut shutdown => {
                info!("{} received, shutting down...", received);
                break;
            }
        }
    }

    if !conn.shutdown().await? {
        warn!("Some handlers were still running at exit");
    }
    info!("Bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["robot-bridge", "eth0", "192.168.123.162", "5005"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_max_in_flight_bounds() {
        let config = parse(&[]).unwrap().bridge_config();
        assert_eq!(config.dispatch.max_in_flight, limits::DEFAULT_MAX_IN_FLIGHT);

        assert!(parse(&["--max-in-flight", "0"]).is_err());
        assert!(parse(&["--max-in-flight", "4294967296"]).is_err());
        let config = parse(&["--max-in-flight", "2", "--busy-policy", "queue"])
            .unwrap()
            .bridge_config();
        assert_eq!(config.dispatch.max_in_flight, 2);
        assert_eq!(config.dispatch.busy_policy, BusyPolicy::Queue);
    }

    #[tokio::test]
    async fn test_sigterm_requests_shutdown() {
        let mut terminate = signal(SignalKind::terminate()).unwrap();
        let status = std::process::Command::new("kill")
            .args(["-s", "TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let received = timeout(Duration::from_secs(5), shutdown_requested(&mut terminate))
            .await
            .unwrap();
        assert_eq!(received, "SIGTERM");
    }
}
