//! JSON datagram codec
//!
//! Every message is a single UTF-8 JSON object in a single datagram:
//! ```text
//! {"command": "ping", ...}                      peer   -> bridge
//! {"status": "success", "command": "ping", ...}  bridge -> peer
//! ```
//!
//! There is no length prefix; the datagram boundary is the message boundary.

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::envelope::COMMAND_FIELD;
use crate::limits::MAX_UDP_PAYLOAD;
use crate::{CommandEnvelope, ResponseEnvelope};

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Envelope is not a JSON object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Encoded message too large: {0} bytes (max: {MAX_UDP_PAYLOAD})")]
    MessageTooLarge(usize),

    #[error("JSON encode error: {0}")]
    EncodeError(#[source] serde_json::Error),
}

/// Decode a command datagram received from the peer
///
/// Fails with `MalformedJson` on invalid UTF-8 or JSON, `NotAnObject` for any
/// other top-level JSON value, and `MissingField` when `command` is absent or is
/// not a string.
pub fn decode(datagram: &[u8]) -> Result<CommandEnvelope, CodecError> {
    let value: Value = serde_json::from_slice(datagram)?;

    let Value::Object(mut fields) = value else {
        return Err(CodecError::NotAnObject);
    };

    let command = match fields.remove(COMMAND_FIELD) {
        Some(Value::String(command)) => command,
        _ => return Err(CodecError::MissingField(COMMAND_FIELD)),
    };

    Ok(CommandEnvelope { command, fields })
}

/// Encode a response into a datagram payload
pub fn encode(response: &ResponseEnvelope) -> Result<Bytes, CodecError> {
    let buf = serde_json::to_vec(response).map_err(CodecError::EncodeError)?;
    check_size(buf)
}

/// Encode a command into a datagram payload (peer side)
pub fn encode_command(command: &CommandEnvelope) -> Result<Bytes, CodecError> {
    let mut object = command.fields.clone();
    object.insert(COMMAND_FIELD.into(), Value::String(command.command.clone()));

    let buf = serde_json::to_vec(&Value::Object(object)).map_err(CodecError::EncodeError)?;
    check_size(buf)
}

/// Decode a response datagram received from the bridge (peer side)
pub fn decode_response(datagram: &[u8]) -> Result<ResponseEnvelope, CodecError> {
    Ok(serde_json::from_slice(datagram)?)
}

fn check_size(buf: Vec<u8>) -> Result<Bytes, CodecError> {
    if buf.len() > MAX_UDP_PAYLOAD {
        return Err(CodecError::MessageTooLarge(buf.len()));
    }
    Ok(Bytes::from(buf))
}
