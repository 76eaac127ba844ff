//! HTTP client for the notifications server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::notifications::{DecodeError, Notification, NotificationsStore, User};

/// Errors that can occur while talking to the notifications server.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    Decode(#[from] DecodeError),
}

/// Source of notification batches for the initial and incremental fetches.
#[async_trait]
pub trait NotificationsFetcher: Send + Sync {
    /// Fetch notifications, only those newer than `since` when given.
    async fn fetch_notifications(&self, since: Option<&str>)
        -> Result<Vec<Notification>, FetchError>;
}

/// HTTP client for the notifications server.
pub struct NotificationsClient {
    client: Client,
    base_url: String,
}

impl NotificationsClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the server (e.g., "http://localhost:3001")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(base_url: impl Into<String>, timeout_sec: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the notifications endpoint, with the `since` filter if given.
    pub fn notifications_url(&self, since: Option<&str>) -> String {
        match since {
            Some(since) if !since.is_empty() => format!(
                "{}/notifications?since={}",
                self.base_url,
                urlencoding::encode(since)
            ),
            _ => format!("{}/notifications", self.base_url),
        }
    }

    /// Get all known users.
    pub async fn fetch_users(&self) -> Result<Vec<User>, FetchError> {
        let url = format!("{}/users", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// Ask the server to generate and push notifications newer than `since`.
    pub async fn force_generate(&self, since: &str) -> Result<(), FetchError> {
        let url = format!("{}/notifications/generate", self.base_url);
        let body = serde_json::json!({ "since": since });
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// Trigger a server push of notifications newer than the newest cached one.
    pub async fn trigger_push(&self, store: &NotificationsStore) -> Result<(), FetchError> {
        let latest = store.latest_timestamp().await.unwrap_or_default();
        debug!("Requesting server push since {:?}", latest);
        self.force_generate(&latest).await
    }
}

#[async_trait]
impl NotificationsFetcher for NotificationsClient {
    async fn fetch_notifications(
        &self,
        since: Option<&str>,
    ) -> Result<Vec<Notification>, FetchError> {
        let url = self.notifications_url(since);
        debug!("Fetching notifications from {}", url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body: serde_json::Value = response.json().await?;
        Ok(Notification::decode_batch(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = NotificationsClient::new("http://localhost:3001/", 5).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3001");
    }

    #[test]
    fn test_notifications_url() {
        let client = NotificationsClient::new("http://localhost:3001", 5).unwrap();

        assert_eq!(
            client.notifications_url(None),
            "http://localhost:3001/notifications"
        );
        assert_eq!(
            client.notifications_url(Some("")),
            "http://localhost:3001/notifications"
        );
        assert_eq!(
            client.notifications_url(Some("2024-05-01T10:00:00.000+02:00")),
            "http://localhost:3001/notifications?since=2024-05-01T10%3A00%3A00.000%2B02%3A00"
        );
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(
            FetchError::Status(500).to_string(),
            "Server responded with status 500"
        );
    }
}
