//! Ping command handler

use super::HandlerContext;
use chrono::Local;
use robot_bridge_shared::{CommandKind, ResponseEnvelope};

/// Local time with microseconds, no offset
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Handle `ping`
pub fn handle_ping(ctx: &HandlerContext) -> ResponseEnvelope {
    ResponseEnvelope::success(CommandKind::Ping.as_str())
        .with_message("pong from robot controller")
        .with("timestamp", Local::now().format(TIMESTAMP_FORMAT).to_string())
        .with("controller_ip", ctx.identity.controller_ip.as_str())
        .with("robot_ip", ctx.identity.robot_ip.as_str())
}
