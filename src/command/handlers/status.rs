//! Status command handler

use super::HandlerContext;
use robot_bridge_shared::{CommandKind, ResponseEnvelope};

/// Handle `get_status`
///
/// Reports a fixed idle state; the bridge answering at all is what shows the
/// link is active.
pub fn handle_get_status(ctx: &HandlerContext) -> ResponseEnvelope {
    ResponseEnvelope::success(CommandKind::GetStatus.as_str())
        .with("robot_status", "idle")
        .with("connection", "active")
        .with("controller_ip", ctx.identity.controller_ip.as_str())
        .with("robot_ip", ctx.identity.robot_ip.as_str())
        .with_message("Robot controller is ready")
}
