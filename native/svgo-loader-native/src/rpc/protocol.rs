use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::trace;

/// Request, event or response carried inside a frame's `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Envelope {
    Request {
        id: u64,
        method: String,
        #[serde(default)]
        args: Vec<JsonValue>,
    },
    Event {
        method: String,
        #[serde(default)]
        args: Vec<JsonValue>,
    },
    Response {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<JsonValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RemoteError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    NoSuchMethod,
    UnregisteredNamespace,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: ErrorCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The peer could not resolve the method at all.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::NoSuchMethod | ErrorCode::UnregisteredNamespace
        )
    }
}

/// Transport frame: `{ "type": "custom", "event": <channel name>, "data": <envelope> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: String,
    pub data: JsonValue,
}

/// Encodes envelopes into frames for one named channel and decodes the reverse.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    event: String,
}

impl FrameCodec {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn encode(&self, envelope: &Envelope) -> Result<String, serde_json::Error> {
        let frame = Frame {
            kind: "custom".to_string(),
            event: self.event.clone(),
            data: JsonValue::String(serde_json::to_string(envelope)?),
        };
        serde_json::to_string(&frame)
    }

    /// `None` for anything that is not a well-formed frame of this channel.
    pub fn decode(&self, raw: &str) -> Option<Envelope> {
        let frame: Frame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                trace!(error = %e, "dropping non-frame message");
                return None;
            }
        };
        if frame.kind != "custom" || frame.event != self.event {
            trace!(event = %frame.event, "dropping frame of another channel");
            return None;
        }

        let envelope = match frame.data {
            JsonValue::String(text) => serde_json::from_str(&text),
            other => serde_json::from_value(other),
        };
        match envelope {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                trace!(error = %e, "dropping malformed envelope");
                None
            }
        }
    }
}
