//! Push channel message types.
//!
//! Every frame pushed by the server uses the same envelope: a `type` used for
//! routing and a type-specific JSON `payload`.

use serde::{Deserialize, Serialize};

use crate::notifications::{DecodeError, Notification};

/// Server -> client frame envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushFrame {
    /// Message type identifier (e.g., "notifications")
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Type-specific payload (JSON value)
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl PushFrame {
    /// Create a new frame with the given type and payload.
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Frame carrying a batch of notifications.
    pub fn notifications(batch: &[Notification]) -> Self {
        Self::new(msg_types::NOTIFICATIONS, batch)
    }
}

/// Frame type constants.
pub mod msg_types {
    /// A batch of new notifications.
    pub const NOTIFICATIONS: &str = "notifications";
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Notifications(Vec<Notification>),
    /// A frame type this client doesn't handle. Not an error.
    Ignored(String),
}

/// Decode a raw text frame.
pub fn decode_frame(text: &str) -> Result<InboundFrame, DecodeError> {
    let frame: PushFrame = serde_json::from_str(text)?;
    match frame.msg_type.as_str() {
        msg_types::NOTIFICATIONS => Ok(InboundFrame::Notifications(Notification::decode_batch(
            frame.payload,
        )?)),
        _ => Ok(InboundFrame::Ignored(frame.msg_type)),
    }
}
