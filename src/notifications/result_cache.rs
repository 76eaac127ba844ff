//! Ordered cache of server notifications.

use std::collections::HashMap;

use super::models::{validate_batch, DecodeError, Notification};

/// Status of the last fetch that fed the cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Nothing fetched yet (or the cache was evicted).
    #[default]
    Idle,
    Loading,
    Succeeded,
    /// The fetch failed. Records already in the cache are kept.
    Failed { error: String },
}

/// Notifications ordered newest first, unique by id.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Vec<Notification>,
    status: FetchStatus,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch into the cache.
    ///
    /// Records with an id already in the cache replace the cached record;
    /// the whole collection is then re-sorted by date, newest first. A batch
    /// containing any malformed record is rejected without merging anything.
    pub fn merge(&mut self, batch: &[Notification]) -> Result<(), DecodeError> {
        validate_batch(batch)?;

        let mut positions: HashMap<String, usize> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        for notification in batch {
            match positions.get(&notification.id) {
                Some(&i) => self.entries[i] = notification.clone(),
                None => {
                    positions.insert(notification.id.clone(), self.entries.len());
                    self.entries.push(notification.clone());
                }
            }
        }

        self.sort();
        Ok(())
    }

    /// Replace the whole collection with the result of a fetch.
    pub fn replace(&mut self, batch: &[Notification]) -> Result<(), DecodeError> {
        validate_batch(batch)?;
        self.entries.clear();
        self.merge(batch)?;
        self.status = FetchStatus::Succeeded;
        Ok(())
    }

    /// Cached notifications, newest first. Empty until a fetch completed.
    pub fn query(&self) -> &[Notification] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.entries.iter().find(|n| n.id == id)
    }

    /// Date of the newest cached notification.
    pub fn latest_date(&self) -> Option<&str> {
        self.entries.first().map(|n| n.date.as_str())
    }

    /// Drop every cached notification and reset the status.
    pub fn evict(&mut self) {
        self.entries.clear();
        self.status = FetchStatus::Idle;
    }

    pub fn begin_fetch(&mut self) {
        self.status = FetchStatus::Loading;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = FetchStatus::Failed {
            error: error.into(),
        };
    }

    pub fn status(&self) -> &FetchStatus {
        &self.status
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ISO-8601 strings sort chronologically, so plain string order is enough.
    fn sort(&mut self) {
        self.entries.sort_by(|a, b| b.date.cmp(&a.date));
    }
}
