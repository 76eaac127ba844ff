//! Lifecycle of one notifications subscription.
//!
//! A controller is created when the first subscriber attaches and is retired
//! for good once the last one detaches. It owns the push channel and the
//! driver task that sequences the initial fetch against the stream.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{FetchError, NotificationsFetcher};
use crate::channel::{DeliveryGate, PushChannel, PushConnector};
use crate::notifications::{IngestionDispatcher, Notification, NotificationsStore};

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

/// Settings shared by every subscription.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Push channel endpoint (e.g., "ws://localhost:3001/ws")
    pub endpoint: String,
    /// Maximum number of decoded batches waiting to be applied.
    pub frame_buffer: usize,
    /// Delay before reopening a push channel that went away.
    pub reconnect_delay: Duration,
}

impl SyncSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            frame_buffer: 64,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Subscription lifecycle. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Idle,
    /// Initial fetch and channel open in flight. Pushed batches are queued.
    Connecting,
    /// Pushed batches are applied as they arrive.
    Streaming,
    Closing,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::Connecting => write!(f, "connecting"),
            LifecycleState::Streaming => write!(f, "streaming"),
            LifecycleState::Closing => write!(f, "closing"),
            LifecycleState::Closed => write!(f, "closed"),
        }
    }
}

enum StreamEvent {
    Batch(Vec<Notification>),
    Disconnected,
    Reconnect,
    Shutdown,
}

/// Drives one subscription from first attach to final close.
pub struct LifecycleController {
    id: u64,
    fetcher: Arc<dyn NotificationsFetcher>,
    connector: Arc<dyn PushConnector>,
    store: Arc<NotificationsStore>,
    settings: SyncSettings,
    state: watch::Sender<LifecycleState>,
    gate: DeliveryGate,
    shutdown: CancellationToken,
    predecessor: Mutex<Option<Arc<LifecycleController>>>,
}

impl LifecycleController {
    pub fn new(
        fetcher: Arc<dyn NotificationsFetcher>,
        connector: Arc<dyn PushConnector>,
        store: Arc<NotificationsStore>,
        settings: SyncSettings,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed),
            fetcher,
            connector,
            store,
            settings,
            state,
            gate: DeliveryGate::new(),
            shutdown: CancellationToken::new(),
            predecessor: Mutex::new(None),
        }
    }

    /// Neither fetch into nor evict the store before `predecessor` has fully closed.
    pub fn with_predecessor(self, predecessor: Arc<LifecycleController>) -> Self {
        *self.predecessor.lock().unwrap() = Some(predecessor);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Leave `Idle` and spawn the driver task.
    ///
    /// Returns false, doing nothing, if the controller was already started
    /// (or shut down).
    pub fn start(self: &Arc<Self>) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Idle {
                *state = LifecycleState::Connecting;
                true
            } else {
                false
            }
        });

        if started {
            info!("Starting notifications subscription {}", self.id);
            let controller = self.clone();
            tokio::spawn(async move { controller.run().await });
        }
        started
    }

    /// End the subscription.
    ///
    /// No batch is applied to the store after this returns; closing the
    /// channel and evicting the cache continue on the driver task.
    pub fn shutdown(&self) {
        self.gate.close();
        self.shutdown.cancel();
        self.state.send_if_modified(|state| match *state {
            LifecycleState::Idle => {
                *state = LifecycleState::Closed;
                true
            }
            LifecycleState::Connecting | LifecycleState::Streaming => {
                *state = LifecycleState::Closing;
                true
            }
            LifecycleState::Closing | LifecycleState::Closed => false,
        });
    }

    /// Wait until the controller reached (or moved past) `target`.
    pub async fn wait_for_state(&self, target: LifecycleState) -> LifecycleState {
        let mut rx = self.state.subscribe();
        // Only fails if the sender is gone, and `self` owns it
        let _ = rx.wait_for(|state| *state >= target).await;
        self.state()
    }

    /// Wait until the channel is closed and the cache evicted.
    pub async fn closed(&self) {
        self.wait_for_state(LifecycleState::Closed).await;
    }

    /// Fetch notifications newer than the newest cached one and merge them.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        let dispatcher = IngestionDispatcher::new(self.store.clone(), self.gate.clone());
        self.fetch_since_latest(&dispatcher).await
    }

    async fn run(self: Arc<Self>) {
        let dispatcher = IngestionDispatcher::new(self.store.clone(), self.gate.clone());

        let initial_load = async {
            let predecessor = self.predecessor.lock().unwrap().clone();
            if let Some(predecessor) = predecessor {
                debug!(
                    "Subscription {} waiting for subscription {} to close",
                    self.id,
                    predecessor.id()
                );
                predecessor.closed().await;
            }

            self.store.begin_fetch().await;
            tokio::join!(
                self.fetcher.fetch_notifications(None),
                PushChannel::open(
                    self.connector.as_ref(),
                    &self.settings.endpoint,
                    self.gate.clone(),
                    self.settings.frame_buffer,
                ),
            )
        };

        let (fetched, opened) = tokio::select! {
            _ = self.shutdown.cancelled() => {
                // Torn down before the initial load finished: nothing to stream
                debug!(
                    "Subscription {} closed before its initial load completed",
                    self.id
                );
                self.finish(None).await;
                return;
            }
            loaded = initial_load => loaded,
        };

        match fetched {
            Ok(batch) => match dispatcher.apply_fetched(&batch).await {
                Ok(count) => info!("Loaded {} notifications", count),
                Err(e) => warn!("Rejected fetched notifications: {}", e),
            },
            Err(e) => dispatcher.fetch_failed(&e).await,
        }

        let channel = match opened {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!("Failed to open push channel: {}", e);
                None
            }
        };

        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Connecting {
                *state = LifecycleState::Streaming;
                true
            } else {
                false
            }
        });

        let channel = self.stream(channel, &dispatcher).await;
        self.finish(channel).await;
    }

    /// Apply pushed batches until shutdown, reopening the channel when it drops.
    async fn stream(
        &self,
        mut channel: Option<PushChannel>,
        dispatcher: &IngestionDispatcher,
    ) -> Option<PushChannel> {
        loop {
            let event = match channel.as_mut() {
                Some(open) => tokio::select! {
                    _ = self.shutdown.cancelled() => StreamEvent::Shutdown,
                    batch = open.next_batch() => match batch {
                        Some(batch) => StreamEvent::Batch(batch),
                        None => StreamEvent::Disconnected,
                    },
                },
                None => tokio::select! {
                    _ = self.shutdown.cancelled() => StreamEvent::Shutdown,
                    _ = tokio::time::sleep(self.settings.reconnect_delay) => StreamEvent::Reconnect,
                },
            };

            match event {
                StreamEvent::Shutdown => return channel,
                StreamEvent::Batch(batch) => {
                    if let Err(e) = dispatcher.dispatch(&batch).await {
                        warn!("Dropping pushed batch: {}", e);
                    }
                }
                StreamEvent::Disconnected => {
                    // The closed gate ends next_batch too; let finish() close the channel
                    if self.shutdown.is_cancelled() {
                        return channel;
                    }
                    if let Some(mut closed) = channel.take() {
                        closed.closed().await;
                    }
                    if !self.shutdown.is_cancelled() {
                        info!(
                            "Push channel disconnected, reconnecting in {}s",
                            self.settings.reconnect_delay.as_secs_f32()
                        );
                    }
                }
                StreamEvent::Reconnect => {
                    let opened = tokio::select! {
                        _ = self.shutdown.cancelled() => return None,
                        opened = PushChannel::open(
                            self.connector.as_ref(),
                            &self.settings.endpoint,
                            self.gate.clone(),
                            self.settings.frame_buffer,
                        ) => opened,
                    };
                    match opened {
                        Ok(reopened) => {
                            info!("Push channel reconnected");
                            channel = Some(reopened);
                            // Pick up whatever was pushed while disconnected
                            if let Err(e) = self.fetch_since_latest(dispatcher).await {
                                warn!("Catch-up fetch failed: {}", e);
                            }
                        }
                        Err(e) => warn!("Push channel reconnect failed: {}", e),
                    }
                }
            }
        }
    }

    async fn fetch_since_latest(
        &self,
        dispatcher: &IngestionDispatcher,
    ) -> Result<usize, FetchError> {
        let since = self.store.latest_timestamp().await;
        let batch = match self.fetcher.fetch_notifications(since.as_deref()).await {
            Ok(batch) => batch,
            Err(e) => {
                dispatcher.fetch_failed(&e).await;
                return Err(e);
            }
        };
        if batch.is_empty() {
            return Ok(0);
        }
        Ok(dispatcher.dispatch(&batch).await?)
    }

    async fn finish(&self, channel: Option<PushChannel>) {
        self.state.send_if_modified(|state| {
            if *state < LifecycleState::Closing {
                *state = LifecycleState::Closing;
                true
            } else {
                false
            }
        });

        if let Some(mut channel) = channel {
            channel.close();
            channel.closed().await;
        }

        // A predecessor still closing would evict after us, and after any successor
        let predecessor = self.predecessor.lock().unwrap().take();
        if let Some(predecessor) = predecessor {
            predecessor.closed().await;
        }
        self.store.evict_results().await;

        self.state.send_replace(LifecycleState::Closed);
        info!("Notifications subscription {} closed", self.id);
    }
}
