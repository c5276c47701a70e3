//! Command and response envelopes
//!
//! A command is a JSON object with a required `command` string and any number of
//! command-specific fields. A response always carries `status` and `command`;
//! everything else is flattened next to them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key holding the command identifier in both directions
pub const COMMAND_FIELD: &str = "command";

/// Commands understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Liveness check
    Ping,
    /// Echo the `data` field back
    TestEcho,
    /// Report readiness
    GetStatus,
    /// Multi-phase handshake gesture
    ShakeHand,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::Ping,
        CommandKind::TestEcho,
        CommandKind::GetStatus,
        CommandKind::ShakeHand,
    ];

    /// Look up a command by its wire name (exact, case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Wire name of the command
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::TestEcho => "test_echo",
            CommandKind::GetStatus => "get_status",
            CommandKind::ShakeHand => "shake_hand",
        }
    }

    /// Whether the command reports several phases before finishing
    pub fn is_multi_phase(self) -> bool {
        matches!(self, CommandKind::ShakeHand)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command received from the controller peer
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub command: String,
    /// Every field other than `command`, unvalidated
    pub fields: Map<String, Value>,
}

impl CommandEnvelope {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fields: Map::new(),
        }
    }

    /// Add a command-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The known command this envelope names, if any
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_name(&self.command)
    }
}

/// Status of a response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    Acknowledged,
    InProgress,
    Completed,
}

impl ResponseStatus {
    /// Whether this status ends the response stream of one invocation
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResponseStatus::Success | ResponseStatus::Error | ResponseStatus::Completed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Error => "error",
            ResponseStatus::Acknowledged => "acknowledged",
            ResponseStatus::InProgress => "in_progress",
            ResponseStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response sent back to the controller peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    pub command: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Builder helpers for creating responses
impl ResponseEnvelope {
    pub fn new(status: ResponseStatus, command: impl Into<String>) -> Self {
        Self {
            status,
            command: command.into(),
            fields: Map::new(),
        }
    }

    pub fn success(command: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Success, command)
    }

    /// Create an error response with a message
    pub fn error(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Error, command).with_message(message)
    }

    /// Create the error answer for a command the bridge does not know
    pub fn unknown_command(command: &str) -> Self {
        Self::error(command, format!("Unknown command: {}", command))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with("message", message.into())
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn message(&self) -> Option<&str> {
        self.field("message").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lookup_is_exact() {
        assert_eq!(CommandKind::from_name("ping"), Some(CommandKind::Ping));
        assert_eq!(CommandKind::from_name("shake_hand"), Some(CommandKind::ShakeHand));
        assert_eq!(CommandKind::from_name("PING"), None);
        assert_eq!(CommandKind::from_name(" ping"), None);
        assert_eq!(CommandKind::from_name(""), None);
    }

    #[test]
    fn test_only_handshake_is_multi_phase() {
        let multi: Vec<_> = CommandKind::ALL
            .into_iter()
            .filter(|k| k.is_multi_phase())
            .collect();
        assert_eq!(multi, vec![CommandKind::ShakeHand]);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(ResponseStatus::Success.is_terminal());
        assert!(ResponseStatus::Error.is_terminal());
        assert!(ResponseStatus::Completed.is_terminal());
        assert!(!ResponseStatus::Acknowledged.is_terminal());
        assert!(!ResponseStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_unknown_command_response() {
        let response = ResponseEnvelope::unknown_command("dance");
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.command, "dance");
        assert_eq!(response.message(), Some("Unknown command: dance"));
    }
}
