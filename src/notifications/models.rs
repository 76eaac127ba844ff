//! Notification data models

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a batch of notifications cannot be ingested.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notification at index {index} has an empty `{field}`")]
    MissingField { index: usize, field: &'static str },
}

/// A notification as issued by the server.
///
/// `date` is an ISO-8601 timestamp; comparing two of them as strings gives
/// the same order as comparing the instants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub message: String,
    /// Id of the user the notification is about. May not resolve to a known user.
    #[serde(default)]
    pub user: String,
}

impl Notification {
    pub fn new(
        id: impl Into<String>,
        date: impl Into<String>,
        message: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            message: message.into(),
            user: user.into(),
        }
    }

    /// Decode a JSON array of notifications, rejecting the whole batch if any
    /// element is malformed.
    pub fn decode_batch(value: serde_json::Value) -> Result<Vec<Notification>, DecodeError> {
        let batch: Vec<Notification> = serde_json::from_value(value)?;
        validate_batch(&batch)?;
        Ok(batch)
    }
}

/// Check that every notification in the batch has an id and a date.
pub fn validate_batch(batch: &[Notification]) -> Result<(), DecodeError> {
    for (index, notification) in batch.iter().enumerate() {
        if notification.id.is_empty() {
            return Err(DecodeError::MissingField { index, field: "id" });
        }
        if notification.date.is_empty() {
            return Err(DecodeError::MissingField {
                index,
                field: "date",
            });
        }
    }
    Ok(())
}

/// Client-only state about a notification. Never sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetadata {
    pub id: String,
    pub read: bool,
    pub is_new: bool,
}

impl NotificationMetadata {
    /// Metadata for a notification seen for the first time.
    pub fn unseen(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            read: false,
            is_new: true,
        }
    }
}

/// A user notifications can refer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}
