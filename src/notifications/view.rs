//! Presentation join of notifications, metadata and users.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::models::{Notification, NotificationMetadata, User};

/// Display name used when a notification refers to a user we don't know.
pub const UNKNOWN_USER: &str = "Unknown User";

/// One row of the notifications list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationView {
    pub id: String,
    pub date: String,
    pub message: String,
    pub user_name: String,
    pub read: bool,
    /// False when the notification has no metadata yet.
    pub is_new: bool,
}

/// Join notifications with their metadata and author, preserving order.
pub fn compose_views(
    notifications: &[Notification],
    metadata: &HashMap<String, NotificationMetadata>,
    users: &[User],
) -> Vec<NotificationView> {
    notifications
        .iter()
        .map(|notification| {
            let user_name = users
                .iter()
                .find(|user| user.id == notification.user)
                .map(|user| user.name.clone())
                .unwrap_or_else(|| UNKNOWN_USER.to_string());
            let (read, is_new) = metadata
                .get(&notification.id)
                .map(|m| (m.read, m.is_new))
                .unwrap_or((false, false));

            NotificationView {
                id: notification.id.clone(),
                date: notification.date.clone(),
                message: notification.message.clone(),
                user_name,
                read,
                is_new,
            }
        })
        .collect()
}

/// Human readable distance between an ISO-8601 date and `now`, e.g. "5 minutes".
///
/// Returns `None` if the date can't be parsed.
pub fn time_ago(date: &str, now: DateTime<Utc>) -> Option<String> {
    let date = DateTime::parse_from_rfc3339(date).ok()?;
    let elapsed = now.signed_duration_since(date.with_timezone(&Utc));

    let minutes = elapsed.num_minutes().max(0);
    let hours = elapsed.num_hours().max(0);
    let days = elapsed.num_days().max(0);

    let text = if minutes < 1 {
        "less than a minute".to_string()
    } else if minutes < 60 {
        plural(minutes, "minute")
    } else if hours < 24 {
        format!("about {}", plural(hours, "hour"))
    } else if days < 30 {
        plural(days, "day")
    } else if days < 365 {
        plural(days / 30, "month")
    } else {
        format!("about {}", plural(days / 365, "year"))
    };
    Some(text)
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
