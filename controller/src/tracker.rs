//! Follows the response stream of one command

use robot_bridge_shared::{ResponseEnvelope, ResponseStatus};
use tracing::debug;

/// How a command's response stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ended with `success` or `completed`
    Succeeded(ResponseStatus),
    /// Ended with `error`; holds the bridge's message
    Failed(String),
    /// No terminal response arrived in time
    TimedOut,
}

impl Outcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Succeeded(_) => 0,
            Outcome::Failed(_) => 1,
            Outcome::TimedOut => 2,
        }
    }
}

/// Collects responses for one command until a terminal status arrives
pub struct ResponseTracker {
    command: String,
    responses: Vec<ResponseEnvelope>,
    outcome: Option<Outcome>,
}

impl ResponseTracker {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            responses: Vec::new(),
            outcome: None,
        }
    }

    /// Record a response; returns the outcome once the stream has ended
    ///
    /// Responses for other commands, and anything after the end, are ignored.
    pub fn observe(&mut self, response: ResponseEnvelope) -> Option<&Outcome> {
        if self.outcome.is_some() {
            return self.outcome.as_ref();
        }
        if response.command != self.command {
            debug!("Ignoring response for '{}'", response.command);
            return None;
        }

        if response.status.is_terminal() {
            self.outcome = Some(match response.status {
                ResponseStatus::Error => {
                    Outcome::Failed(response.message().unwrap_or_default().to_string())
                }
                status => Outcome::Succeeded(status),
            });
        }
        self.responses.push(response);
        self.outcome.as_ref()
    }

    /// Close the stream without a terminal response
    pub fn timed_out(&mut self) -> &Outcome {
        self.outcome.get_or_insert(Outcome::TimedOut)
    }

    /// Responses recorded so far, in arrival order
    pub fn responses(&self) -> &[ResponseEnvelope] {
        &self.responses
    }
}
