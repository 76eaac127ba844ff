//! Pezzottify Notification Sync Library
//!
//! Keeps a local notification cache in sync with the server: an initial HTTP
//! fetch seeds the cache, a WebSocket push channel streams new notifications
//! into it, and a client-only metadata store tracks read/new state.

pub mod api;
pub mod channel;
pub mod config;
pub mod notifications;
pub mod subscription;

// Re-export commonly used types for convenience
pub use api::{FetchError, NotificationsClient, NotificationsFetcher};
pub use channel::{PushConnector, WebSocketConnector};
pub use notifications::{
    FetchStatus, Notification, NotificationMetadata, NotificationView, NotificationsStore, User,
};
pub use subscription::{LifecycleState, NotificationsSubscriptions, SubscriptionHandle, SyncSettings};
