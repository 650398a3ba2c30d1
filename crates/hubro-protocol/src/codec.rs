//! Frame encoding and decoding.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::message::{InboundMessage, MessageKind, OutboundMessage};

/// A frame could not be encoded or decoded.
///
/// Decoding errors are never fatal to a session: the channel logs them and
/// drops the offending frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame is valid JSON but not an object.
    #[error("Frame is not a JSON object")]
    NotAnObject,
    /// The frame object has no string `type` field.
    #[error("Frame has no string `type` field")]
    MissingType,
    /// The payload of a recognized message could not be read.
    #[error("Invalid `{kind}` payload: {source}")]
    Payload {
        /// Message kind whose payload failed.
        kind: MessageKind,
        /// Underlying deserialization error.
        source: serde_json::Error,
    },
}

/// Serialize a message into a single text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
pub fn encode(message: &OutboundMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Parse a text frame into a message.
///
/// Only the envelope is validated: the frame must be a JSON object with a
/// string `type`. Unrecognized types decode to [`InboundMessage::Unknown`].
///
/// # Errors
///
/// Returns a [`ProtocolError`] if the frame is not JSON, not an object, or
/// lacks a string `type`.
pub fn decode(text: &str) -> Result<InboundMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(ProtocolError::NotAnObject);
    }

    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    let Some(kind) = MessageKind::from_tag(tag) else {
        return Ok(InboundMessage::Unknown(tag.to_owned()));
    };

    let message = match kind {
        MessageKind::Reload => InboundMessage::Reload,
        MessageKind::Markdown => InboundMessage::Markdown(payload(kind, value)?),
        MessageKind::FileContent => InboundMessage::FileContent(payload(kind, value)?),
        MessageKind::Saved => InboundMessage::Saved(payload(kind, value)?),
        MessageKind::Created => InboundMessage::Created(payload(kind, value)?),
        MessageKind::Error => InboundMessage::Error(payload(kind, value)?),
    };

    Ok(message)
}

fn payload<T: DeserializeOwned>(kind: MessageKind, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|source| ProtocolError::Payload { kind, source })
}
