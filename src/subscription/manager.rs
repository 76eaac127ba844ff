//! Reference-counted access to the notifications subscription.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::controller::{LifecycleController, LifecycleState, SyncSettings};
use crate::api::{FetchError, NotificationsFetcher};
use crate::channel::PushConnector;
use crate::notifications::NotificationsStore;

#[derive(Default)]
struct Registry {
    subscribers: usize,
    active: Option<Arc<LifecycleController>>,
    /// Last controller shut down, possibly still closing.
    retired: Option<Arc<LifecycleController>>,
}

/// Hands out subscription handles and keeps one live controller while at
/// least one handle exists.
pub struct NotificationsSubscriptions {
    fetcher: Arc<dyn NotificationsFetcher>,
    connector: Arc<dyn PushConnector>,
    store: Arc<NotificationsStore>,
    settings: SyncSettings,
    registry: Mutex<Registry>,
}

impl NotificationsSubscriptions {
    pub fn new(
        fetcher: Arc<dyn NotificationsFetcher>,
        connector: Arc<dyn PushConnector>,
        store: Arc<NotificationsStore>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            fetcher,
            connector,
            store,
            settings,
            registry: Mutex::new(Registry::default()),
        })
    }

    pub fn store(&self) -> &Arc<NotificationsStore> {
        &self.store
    }

    /// Register interest in the notification stream.
    ///
    /// The first attach starts a fresh controller; later ones share it.
    pub fn attach(self: &Arc<Self>) -> SubscriptionHandle {
        let mut registry = self.registry.lock().unwrap();
        registry.subscribers += 1;

        let controller = match &registry.active {
            Some(controller) => controller.clone(),
            None => {
                let mut controller = LifecycleController::new(
                    self.fetcher.clone(),
                    self.connector.clone(),
                    self.store.clone(),
                    self.settings.clone(),
                );
                if let Some(retired) = registry.retired.take() {
                    if retired.state() != LifecycleState::Closed {
                        controller = controller.with_predecessor(retired);
                    }
                }
                let controller = Arc::new(controller);
                registry.active = Some(controller.clone());
                controller
            }
        };
        controller.start();

        debug!(
            "Subscriber attached ({} active) to subscription {}",
            registry.subscribers,
            controller.id()
        );
        SubscriptionHandle {
            owner: self.clone(),
            controller,
            detached: false,
        }
    }

    /// Number of live handles.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().unwrap().subscribers
    }

    /// The controller currently serving subscribers, if any.
    pub fn active_controller(&self) -> Option<Arc<LifecycleController>> {
        self.registry.lock().unwrap().active.clone()
    }

    /// Returns the controller if this was the last subscriber.
    fn detach(&self) -> Option<Arc<LifecycleController>> {
        let controller = {
            let mut registry = self.registry.lock().unwrap();
            registry.subscribers = registry.subscribers.saturating_sub(1);
            if registry.subscribers > 0 {
                debug!("Subscriber detached ({} remaining)", registry.subscribers);
                return None;
            }
            let controller = registry.active.take()?;
            registry.retired = Some(controller.clone());
            controller
        };

        info!(
            "Last subscriber detached, closing subscription {}",
            controller.id()
        );
        controller.shutdown();
        Some(controller)
    }
}

/// One consumer's interest in the notification stream.
///
/// Dropping the handle detaches it.
pub struct SubscriptionHandle {
    owner: Arc<NotificationsSubscriptions>,
    controller: Arc<LifecycleController>,
    detached: bool,
}

impl SubscriptionHandle {
    pub fn store(&self) -> &Arc<NotificationsStore> {
        self.owner.store()
    }

    pub fn state(&self) -> LifecycleState {
        self.controller.state()
    }

    /// Wait until the initial load completed and pushes are being applied.
    pub async fn wait_until_streaming(&self) -> LifecycleState {
        self.controller
            .wait_for_state(LifecycleState::Streaming)
            .await
    }

    /// Fetch and merge notifications newer than the newest cached one.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        self.controller.refresh().await
    }

    /// Detach without waiting for the channel to close.
    pub fn detach(mut self) {
        self.release();
    }

    /// Detach, and if this was the last subscriber wait until the
    /// subscription is fully closed.
    pub async fn close(mut self) {
        if let Some(controller) = self.release() {
            controller.closed().await;
        }
    }

    fn release(&mut self) -> Option<Arc<LifecycleController>> {
        if self.detached {
            return None;
        }
        self.detached = true;
        self.owner.detach()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}
