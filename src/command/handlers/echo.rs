//! Echo command handler

use robot_bridge_shared::{CommandEnvelope, CommandKind, ResponseEnvelope};
use serde_json::Value;

/// Handle `test_echo`: return the `data` field unchanged
pub fn handle_test_echo(envelope: &CommandEnvelope) -> ResponseEnvelope {
    let data = envelope
        .field("data")
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));

    // Strings render bare in the message, anything else as JSON
    let shown = match &data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    ResponseEnvelope::success(CommandKind::TestEcho.as_str())
        .with("echo_data", data)
        .with_message(format!("Echoed from robot controller: {}", shown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_echo_returns_data() {
        let envelope = CommandEnvelope::new("test_echo").with_field("data", "Hello from Unity!");
        let response = handle_test_echo(&envelope);

        assert_eq!(response.command, "test_echo");
        assert_eq!(response.field("echo_data"), Some(&json!("Hello from Unity!")));
        assert_eq!(
            response.message(),
            Some("Echoed from robot controller: Hello from Unity!")
        );
    }

    #[test]
    fn test_echo_defaults_to_empty_string() {
        let response = handle_test_echo(&CommandEnvelope::new("test_echo"));
        assert_eq!(response.field("echo_data"), Some(&json!("")));
        assert_eq!(response.message(), Some("Echoed from robot controller: "));
    }

    #[test]
    fn test_echo_keeps_structured_data() {
        let envelope = CommandEnvelope::new("test_echo").with_field("data", json!({"n": [1, 2]}));
        let response = handle_test_echo(&envelope);

        assert_eq!(response.field("echo_data"), Some(&json!({"n": [1, 2]})));
        assert_eq!(
            response.message(),
            Some("Echoed from robot controller: {\"n\":[1,2]}")
        );
    }
}
