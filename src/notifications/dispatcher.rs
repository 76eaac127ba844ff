//! Applies ingested batches to both stores.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::FetchError;
use crate::channel::DeliveryGate;

use super::models::{validate_batch, DecodeError, Notification};
use super::store::NotificationsStore;

/// Turns a batch of notifications into a cache merge plus a metadata upsert.
///
/// Both effects happen under a single store write lock, so a reader sees
/// either none or both of them. Nothing is applied once the gate is closed.
pub struct IngestionDispatcher {
    store: Arc<NotificationsStore>,
    gate: DeliveryGate,
}

impl IngestionDispatcher {
    pub fn new(store: Arc<NotificationsStore>, gate: DeliveryGate) -> Self {
        Self { store, gate }
    }

    /// Merge a pushed (or incrementally fetched) batch.
    ///
    /// Returns the number of notifications applied: 0 when the gate was closed.
    pub async fn dispatch(&self, batch: &[Notification]) -> Result<usize, DecodeError> {
        validate_batch(batch)?;
        {
            let mut state = self.store.write().await;
            if !self.gate.is_open() {
                debug!(
                    "Delivery gate closed, dropping batch of {} notifications",
                    batch.len()
                );
                return Ok(0);
            }
            state.results.merge(batch)?;
            state
                .metadata
                .upsert_batch(batch.iter().map(|n| n.id.as_str()));
        }
        self.store.notify_changed();
        Ok(batch.len())
    }

    /// Replace the cache with the initial fetch result.
    pub async fn apply_fetched(&self, batch: &[Notification]) -> Result<usize, DecodeError> {
        validate_batch(batch)?;
        {
            let mut state = self.store.write().await;
            if !self.gate.is_open() {
                debug!("Delivery gate closed, dropping fetch result");
                return Ok(0);
            }
            state.results.replace(batch)?;
            state
                .metadata
                .upsert_batch(batch.iter().map(|n| n.id.as_str()));
        }
        self.store.notify_changed();
        Ok(batch.len())
    }

    /// Record a failed fetch on the cache status.
    pub async fn fetch_failed(&self, error: &FetchError) {
        warn!("Notifications fetch failed: {}", error);
        {
            let mut state = self.store.write().await;
            if !self.gate.is_open() {
                return;
            }
            state.results.fail(error.to_string());
        }
        self.store.notify_changed();
    }
}
