//! Request/response boundary with the notifications server.

mod client;

pub use client::{FetchError, NotificationsClient, NotificationsFetcher};
