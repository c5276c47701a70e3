//! Command handlers, one per wire command

mod echo;
mod handshake;
mod ping;
mod status;

pub use echo::handle_test_echo;
pub use handshake::{handle_shake_hand, HandshakeTimings};
pub use ping::handle_ping;
pub use status::handle_get_status;

use super::ReplySink;
use crate::device::DeviceHandle;
use robot_bridge_shared::{CommandEnvelope, CommandKind};

/// Addresses the bridge reports about itself
#[derive(Debug, Clone)]
pub struct PeerIdentity {
    pub controller_ip: String,
    pub robot_ip: String,
}

impl Default for PeerIdentity {
    fn default() -> Self {
        Self {
            controller_ip: "192.168.123.164".into(),
            robot_ip: "192.168.123.161".into(),
        }
    }
}

/// Context passed to command handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub identity: PeerIdentity,
    pub device: DeviceHandle,
    pub handshake: HandshakeTimings,
}

/// Run the handler for `kind` to completion, sending every response it produces
pub async fn run(
    kind: CommandKind,
    envelope: &CommandEnvelope,
    ctx: &HandlerContext,
    reply: &ReplySink,
) {
    match kind {
        CommandKind::Ping => {
            reply.send(&handle_ping(ctx)).await;
        }
        CommandKind::TestEcho => {
            reply.send(&handle_test_echo(envelope)).await;
        }
        CommandKind::GetStatus => {
            reply.send(&handle_get_status(ctx)).await;
        }
        CommandKind::ShakeHand => {
            handle_shake_hand(ctx, reply).await;
        }
    }
}
