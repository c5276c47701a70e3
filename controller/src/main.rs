mod session;
mod tracker;

use anyhow::Result;
use clap::Parser;
use robot_bridge_shared::{CommandEnvelope, ResponseEnvelope};
use session::BridgeSession;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tracker::{Outcome, ResponseTracker};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Send one command to a robot bridge and follow its responses
#[derive(Parser, Debug)]
#[command(name = "controller", version)]
struct Args {
    /// Bridge address, e.g. 192.168.123.164:5005
    bridge_addr: SocketAddr,

    /// Command to send (ping, test_echo, get_status, shake_hand)
    command: String,

    /// Value of the `data` field, used by test_echo
    #[arg(long)]
    data: Option<String>,

    /// Give up if the bridge is silent for this long
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Local address to send from
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let mut session = BridgeSession::open(args.bind, args.bridge_addr).await?;
    let mut command = CommandEnvelope::new(args.command.as_str());
    if let Some(data) = &args.data {
        command = command.with_field("data", data.as_str());
    }

    session.send(&command).await?;
    info!(
        "Sent '{}' to {} from {}",
        command.command,
        session.bridge(),
        session.local_addr()?
    );

    let mut tracker = ResponseTracker::new(command.command.as_str());
    let outcome = follow(
        &mut session,
        &mut tracker,
        Duration::from_millis(args.timeout_ms),
    )
    .await?;

    match &outcome {
        Outcome::Succeeded(status) => info!("'{}' finished: {}", command.command, status),
        Outcome::Failed(message) => error!("'{}' failed: {}", command.command, message),
        Outcome::TimedOut => warn!(
            "No final response for '{}' after {} responses",
            command.command,
            tracker.responses().len()
        ),
    }

    Ok(ExitCode::from(outcome.exit_code()))
}

/// Print responses as they arrive until the stream ends or goes quiet
async fn follow(
    session: &mut BridgeSession,
    tracker: &mut ResponseTracker,
    idle_timeout: Duration,
) -> Result<Outcome> {
    loop {
        let Some(response) = session.recv(idle_timeout).await? else {
            return Ok(tracker.timed_out().clone());
        };
        print_response(&response)?;
        if let Some(outcome) = tracker.observe(response) {
            return Ok(outcome.clone());
        }
    }
}

fn print_response(response: &ResponseEnvelope) -> Result<()> {
    println!("{}", serde_json::to_string(response)?);
    Ok(())
}
