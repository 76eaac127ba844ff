//! Shared constants for end-to-end tests

use pezzottify_notification_sync::{Notification, User};

/// Maximum time to wait for the server to be ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Default timeout when waiting for the store to reach some state
pub const WAIT_TIMEOUT_MS: u64 = 5000;

pub const USER_1_ID: &str = "user-1";
pub const USER_1_NAME: &str = "Alice";
pub const USER_2_ID: &str = "user-2";
pub const USER_2_NAME: &str = "Bob";

/// User id that no known user has
pub const GHOST_USER_ID: &str = "user-ghost";

pub fn test_users() -> Vec<User> {
    vec![
        User {
            id: USER_1_ID.to_string(),
            name: USER_1_NAME.to_string(),
        },
        User {
            id: USER_2_ID.to_string(),
            name: USER_2_NAME.to_string(),
        },
    ]
}

/// Three notifications, deliberately out of date order.
pub fn seed_notifications() -> Vec<Notification> {
    vec![
        Notification::new("seed-1", "2024-05-01T10:00:00.000Z", "Welcome!", USER_1_ID),
        Notification::new("seed-3", "2024-05-03T10:00:00.000Z", "Poked you", GHOST_USER_ID),
        Notification::new("seed-2", "2024-05-02T10:00:00.000Z", "Said hi", USER_2_ID),
    ]
}
