//! Shared owner of the result cache and the metadata store.

use std::collections::HashMap;

use tokio::sync::{watch, RwLock, RwLockWriteGuard};
use tracing::debug;

use super::metadata_store::MetadataStore;
use super::models::{Notification, NotificationMetadata, User};
use super::result_cache::{FetchStatus, ResultCache};
use super::view::{compose_views, NotificationView};

/// State guarded by the store lock.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) results: ResultCache,
    pub(crate) metadata: MetadataStore,
}

/// Both stores read in one critical section.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationsSnapshot {
    pub notifications: Vec<Notification>,
    pub metadata: HashMap<String, NotificationMetadata>,
    pub status: FetchStatus,
}

/// Notification state shared by the subscription machinery and consumers.
///
/// Create one per session and hand it to components as `Arc<NotificationsStore>`.
/// Every mutation bumps a revision that consumers can watch via [`subscribe`].
///
/// [`subscribe`]: NotificationsStore::subscribe
pub struct NotificationsStore {
    state: RwLock<StoreState>,
    revision: watch::Sender<u64>,
}

impl Default for NotificationsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationsStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(StoreState::default()),
            revision,
        }
    }

    /// Receive the store revision each time its content changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Cached notifications, newest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.results.query().to_vec()
    }

    pub async fn notification(&self, id: &str) -> Option<Notification> {
        self.state.read().await.results.get(id).cloned()
    }

    /// Metadata for a notification, `None` when none was recorded yet.
    pub async fn metadata(&self, id: &str) -> Option<NotificationMetadata> {
        self.state.read().await.metadata.get(id).cloned()
    }

    pub async fn metadata_entities(&self) -> HashMap<String, NotificationMetadata> {
        self.state.read().await.metadata.entities().clone()
    }

    pub async fn fetch_status(&self) -> FetchStatus {
        self.state.read().await.results.status().clone()
    }

    /// Date of the newest cached notification.
    pub async fn latest_timestamp(&self) -> Option<String> {
        self.state
            .read()
            .await
            .results
            .latest_date()
            .map(str::to_string)
    }

    pub async fn unread_count(&self) -> usize {
        self.state.read().await.metadata.unread_count()
    }

    pub async fn new_count(&self) -> usize {
        self.state.read().await.metadata.new_count()
    }

    pub async fn snapshot(&self) -> NotificationsSnapshot {
        let state = self.state.read().await;
        NotificationsSnapshot {
            notifications: state.results.query().to_vec(),
            metadata: state.metadata.entities().clone(),
            status: state.results.status().clone(),
        }
    }

    /// Cached notifications joined with their metadata and users.
    pub async fn views(&self, users: &[User]) -> Vec<NotificationView> {
        let state = self.state.read().await;
        compose_views(state.results.query(), state.metadata.entities(), users)
    }

    pub async fn mark_all_read(&self) {
        self.state.write().await.metadata.mark_all_read();
        self.notify_changed();
    }

    /// Mark one notification as read. Returns false if it has no metadata.
    pub async fn mark_read(&self, id: &str) -> bool {
        let marked = self.state.write().await.metadata.mark_read(id);
        if marked {
            self.notify_changed();
        }
        marked
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().await
    }

    pub(crate) async fn begin_fetch(&self) {
        self.state.write().await.results.begin_fetch();
        self.notify_changed();
    }

    /// Drop the cached notifications. Metadata is kept.
    pub(crate) async fn evict_results(&self) {
        let evicted = {
            let mut state = self.state.write().await;
            let count = state.results.len();
            state.results.evict();
            count
        };
        debug!("Evicted {} cached notifications", evicted);
        self.notify_changed();
    }

    pub(crate) fn notify_changed(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
