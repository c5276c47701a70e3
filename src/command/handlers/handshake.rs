//! Handshake command handler
//!
//! Walks one `HandshakeStateMachine` through the physical gesture. The
//! acknowledgement goes out before the device is claimed, so a second handshake
//! is acknowledged at once and then waits its turn at the device lock.

use super::HandlerContext;
use crate::command::ReplySink;
use crate::device::{Device, DeviceError, DeviceResult, HandPhase};
use robot_bridge_shared::limits;
use robot_bridge_shared::state_machine::{
    HandshakeEvent, HandshakePhase, HandshakeStateMachine, TransitionResult,
};
use robot_bridge_shared::{CommandKind, ResponseEnvelope};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

pub const GREETING: &str = "Hello! Let's shake hands!";
pub const CLOSING: &str = "Nice to meet you!";

/// Handshake pacing
#[derive(Debug, Clone)]
pub struct HandshakeTimings {
    /// How long the hand stays out for the player
    pub peer_wait: Duration,
    /// Say a greeting before extending and a closing line after retracting
    pub speak: bool,
}

impl Default for HandshakeTimings {
    fn default() -> Self {
        Self {
            peer_wait: Duration::from_millis(limits::HANDSHAKE_PEER_WAIT_MS),
            speak: false,
        }
    }
}

/// How one handshake invocation ended
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeOutcome {
    pub phase: HandshakePhase,
    pub elapsed: Duration,
    /// Failure message sent to the peer, if any
    pub error: Option<String>,
}

/// A single in-flight handshake, owned by its handler task
struct ActionInstance {
    fsm: HandshakeStateMachine,
    started_at: Instant,
    error: Option<String>,
}

impl ActionInstance {
    fn new() -> Self {
        Self {
            fsm: HandshakeStateMachine::new(),
            started_at: Instant::now(),
            error: None,
        }
    }

    fn phase(&self) -> HandshakePhase {
        self.fsm.phase()
    }

    /// Send the response for the current phase, if it reports one
    async fn announce(&self, reply: &ReplySink) {
        if let Some((status, message)) = self.phase().report() {
            let response =
                ResponseEnvelope::new(status, CommandKind::ShakeHand.as_str()).with_message(message);
            reply.send(&response).await;
        }
    }

    /// Apply `event`; returns false when the machine refused it
    async fn apply(&mut self, event: HandshakeEvent, reply: &ReplySink) -> bool {
        match self.fsm.process_event(event) {
            TransitionResult::Success(phase) => {
                debug!(%phase, "[HANDSHAKE] Entered phase");
                self.announce(reply).await;
                true
            }
            TransitionResult::Failed { from, message } => {
                error!(phase = %from, "[HANDSHAKE] {}", message);
                let response = ResponseEnvelope::error(CommandKind::ShakeHand.as_str(), &message);
                reply.send(&response).await;
                self.error = Some(message);
                true
            }
            TransitionResult::Invalid { from, event } => {
                error!("[HANDSHAKE] Event {:?} not valid in phase {}", event, from);
                false
            }
        }
    }

    fn finish(self) -> HandshakeOutcome {
        HandshakeOutcome {
            phase: self.fsm.phase(),
            elapsed: self.started_at.elapsed(),
            error: self.error,
        }
    }
}

/// Handle `shake_hand`
pub async fn handle_shake_hand(ctx: &HandlerContext, reply: &ReplySink) -> HandshakeOutcome {
    let mut action = ActionInstance::new();
    action.announce(reply).await;

    if ctx.device.is_busy() {
        info!("[HANDSHAKE] Device busy, waiting for the current action to finish");
    }
    let device = ctx.device.acquire().await;

    loop {
        let event = match action.phase() {
            HandshakePhase::Acknowledged => HandshakeEvent::Begin,
            HandshakePhase::Extending => extend(&*device, &ctx.handshake)
                .await
                .map_or_else(fault, |()| HandshakeEvent::Extended),
            HandshakePhase::AwaitingPeer => {
                sleep(ctx.handshake.peer_wait).await;
                HandshakeEvent::PeerWaitElapsed
            }
            HandshakePhase::Completing => retract(&*device, &ctx.handshake)
                .await
                .map_or_else(fault, |()| HandshakeEvent::Retracted),
            HandshakePhase::Done | HandshakePhase::Failed => break,
        };

        if !action.apply(event, reply).await {
            break;
        }
    }
    drop(device);

    let outcome = action.finish();
    info!(
        phase = %outcome.phase,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        error = ?outcome.error,
        "[HANDSHAKE] Finished"
    );
    outcome
}

async fn extend(device: &dyn Device, timings: &HandshakeTimings) -> DeviceResult<()> {
    if timings.speak {
        device.speak(GREETING).await?;
    }
    device.shake_hand_gesture(HandPhase::Extend).await
}

async fn retract(device: &dyn Device, timings: &HandshakeTimings) -> DeviceResult<()> {
    device.shake_hand_gesture(HandPhase::Retract).await?;
    if timings.speak {
        device.speak(CLOSING).await?;
    }
    Ok(())
}

fn fault(e: DeviceError) -> HandshakeEvent {
    HandshakeEvent::DeviceFault {
        reason: e.to_string(),
    }
}
