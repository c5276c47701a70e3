//! Handshake Action State Machine
//!
//! Defines the phases of the `shake_hand` gesture and the only valid order
//! through them. The machine is pure: the bridge drives it with events as device
//! calls complete and sends the response each reporting phase asks for.

use crate::ResponseStatus;
use std::fmt;

/// Phases of a single handshake invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Command received, robot preparing
    Acknowledged,
    /// Arm moving out
    Extending,
    /// Hand held out for the player
    AwaitingPeer,
    /// Arm returning
    Completing,
    /// Gesture finished
    Done,
    /// Device failed; terminal
    Failed,
}

impl HandshakePhase {
    /// The response this phase emits on entry, if it reports at all
    pub fn report(self) -> Option<(ResponseStatus, &'static str)> {
        match self {
            HandshakePhase::Acknowledged => Some((
                ResponseStatus::Acknowledged,
                "Handshake command received, preparing robot",
            )),
            HandshakePhase::AwaitingPeer => Some((
                ResponseStatus::InProgress,
                "Robot hand extended, waiting for player",
            )),
            HandshakePhase::Done => Some((
                ResponseStatus::Completed,
                "Handshake completed, robot returning to idle",
            )),
            // Failure text depends on the fault, see `TransitionResult::Failed`
            HandshakePhase::Extending | HandshakePhase::Completing | HandshakePhase::Failed => {
                None
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakePhase::Done | HandshakePhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandshakePhase::Acknowledged => "acknowledged",
            HandshakePhase::Extending => "extending",
            HandshakePhase::AwaitingPeer => "awaiting_peer",
            HandshakePhase::Completing => "completing",
            HandshakePhase::Done => "done",
            HandshakePhase::Failed => "failed",
        }
    }
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that advance a handshake
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    /// Acknowledgement sent, start moving
    Begin,
    /// Arm reached the extended pose
    Extended,
    /// The player had their chance to take the hand
    PeerWaitElapsed,
    /// Arm back in the rest pose
    Retracted,
    /// Device call failed
    DeviceFault { reason: String },
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Transition was valid and phase changed
    Success(HandshakePhase),
    /// Event does not apply to the current phase; phase unchanged
    Invalid {
        from: HandshakePhase,
        event: HandshakeEvent,
    },
    /// Device fault moved the machine to `Failed`
    Failed {
        from: HandshakePhase,
        message: String,
    },
}

/// The state machine for one handshake invocation
#[derive(Debug)]
pub struct HandshakeStateMachine {
    phase: HandshakePhase,
}

impl Default for HandshakeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeStateMachine {
    /// Create a machine in the `Acknowledged` phase
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::Acknowledged,
        }
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: HandshakeEvent) -> TransitionResult {
        if let HandshakeEvent::DeviceFault { reason } = &event {
            if self.phase.is_terminal() {
                return TransitionResult::Invalid {
                    from: self.phase,
                    event,
                };
            }
            let from = self.phase;
            self.phase = HandshakePhase::Failed;
            return TransitionResult::Failed {
                from,
                message: format!("Handshake failed during {}: {}", from, reason),
            };
        }

        match self.next_phase(&event) {
            Some(phase) => {
                self.phase = phase;
                TransitionResult::Success(phase)
            }
            None => TransitionResult::Invalid {
                from: self.phase,
                event,
            },
        }
    }

    fn next_phase(&self, event: &HandshakeEvent) -> Option<HandshakePhase> {
        use HandshakeEvent::*;
        use HandshakePhase::*;

        match (self.phase, event) {
            (Acknowledged, Begin) => Some(Extending),
            (Extending, Extended) => Some(AwaitingPeer),
            (AwaitingPeer, PeerWaitElapsed) => Some(Completing),
            (Completing, Retracted) => Some(Done),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase() {
        let fsm = HandshakeStateMachine::new();
        assert_eq!(fsm.phase(), HandshakePhase::Acknowledged);
    }

    #[test]
    fn test_full_sequence_reports_three_statuses() {
        let mut fsm = HandshakeStateMachine::new();
        let mut reported = vec![fsm.phase().report().map(|(status, _)| status)];

        for event in [
            HandshakeEvent::Begin,
            HandshakeEvent::Extended,
            HandshakeEvent::PeerWaitElapsed,
            HandshakeEvent::Retracted,
        ] {
            match fsm.process_event(event) {
                TransitionResult::Success(phase) => {
                    reported.push(phase.report().map(|(status, _)| status))
                }
                other => panic!("unexpected transition: {:?}", other),
            }
        }

        let reported: Vec<_> = reported.into_iter().flatten().collect();
        assert_eq!(
            reported,
            vec![
                ResponseStatus::Acknowledged,
                ResponseStatus::InProgress,
                ResponseStatus::Completed
            ]
        );
        assert_eq!(fsm.phase(), HandshakePhase::Done);
    }

    #[test]
    fn test_phases_cannot_be_skipped() {
        let mut fsm = HandshakeStateMachine::new();

        let result = fsm.process_event(HandshakeEvent::Retracted);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.phase(), HandshakePhase::Acknowledged);

        fsm.process_event(HandshakeEvent::Begin);
        let result = fsm.process_event(HandshakeEvent::PeerWaitElapsed);
        assert!(matches!(
            result,
            TransitionResult::Invalid {
                from: HandshakePhase::Extending,
                ..
            }
        ));
    }

    #[test]
    fn test_device_fault_is_terminal() {
        let mut fsm = HandshakeStateMachine::new();
        fsm.process_event(HandshakeEvent::Begin);

        let result = fsm.process_event(HandshakeEvent::DeviceFault {
            reason: "arm blocked".into(),
        });
        match result {
            TransitionResult::Failed { from, message } => {
                assert_eq!(from, HandshakePhase::Extending);
                assert_eq!(message, "Handshake failed during extending: arm blocked");
            }
            other => panic!("unexpected transition: {:?}", other),
        }
        assert!(fsm.phase().is_terminal());

        // No way out of Failed
        let result = fsm.process_event(HandshakeEvent::Extended);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        let result = fsm.process_event(HandshakeEvent::DeviceFault {
            reason: "again".into(),
        });
        assert!(matches!(result, TransitionResult::Invalid { .. }));
    }

    #[test]
    fn test_silent_phases() {
        assert!(HandshakePhase::Extending.report().is_none());
        assert!(HandshakePhase::Completing.report().is_none());
        assert!(HandshakePhase::Failed.report().is_none());
    }
}
