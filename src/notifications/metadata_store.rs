//! Client-side read/new state, keyed by notification id.

use std::collections::HashMap;

use super::models::NotificationMetadata;

/// Read/new flags for every notification the client has ever ingested.
///
/// Entries are never removed: evicting the result cache leaves this store
/// untouched, so an id here may have no matching cached notification.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: HashMap<String, NotificationMetadata>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly ingested batch.
    ///
    /// Every entry already in the store is demoted first (`is_new = !read`),
    /// then ids not yet known are inserted as unread and new. Ids already
    /// present keep their flags.
    pub fn upsert_batch<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for metadata in self.entries.values_mut() {
            metadata.is_new = !metadata.read;
        }

        for id in ids {
            if !self.entries.contains_key(id) {
                self.entries
                    .insert(id.to_string(), NotificationMetadata::unseen(id));
            }
        }
    }

    /// Mark every entry as read.
    ///
    /// `is_new` is left as is: entries keep showing as new until the next
    /// batch runs the demotion pass.
    pub fn mark_all_read(&mut self) {
        for metadata in self.entries.values_mut() {
            metadata.read = true;
        }
    }

    /// Mark a single entry as read. Returns false if the id is unknown.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(metadata) => {
                metadata.read = true;
                true
            }
            None => false,
        }
    }

    /// Metadata for an id, `None` if nothing was ingested with that id yet.
    pub fn get(&self, id: &str) -> Option<&NotificationMetadata> {
        self.entries.get(id)
    }

    pub fn entities(&self) -> &HashMap<String, NotificationMetadata> {
        &self.entries
    }

    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|m| !m.read).count()
    }

    pub fn new_count(&self) -> usize {
        self.entries.values().filter(|m| m.is_new).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
