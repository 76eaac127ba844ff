//! Push channel adapter.
//!
//! Owns one connection, decodes its frames on a reader task and queues the
//! notification batches for a single consumer, in wire order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::messages::{decode_frame, InboundFrame};
use super::transport::{ChannelError, FrameSource, PushConnector};
use crate::notifications::Notification;

/// Flag deciding whether batches may still reach the stores.
///
/// Closing it is synchronous and permanent; it is checked before queueing a
/// batch and again, under the store lock, before applying it.
#[derive(Debug, Clone)]
pub struct DeliveryGate(Arc<AtomicBool>);

impl Default for DeliveryGate {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryGate {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Close the gate. Returns true if it was open.
    pub fn close(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// An open push channel.
pub struct PushChannel {
    batches: mpsc::Receiver<Vec<Notification>>,
    gate: DeliveryGate,
    shutdown: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl PushChannel {
    /// Connect to `endpoint` and start reading frames.
    ///
    /// At most `capacity` decoded batches are queued; past that the reader
    /// stops pulling frames off the connection until the consumer catches up.
    pub async fn open(
        connector: &dyn PushConnector,
        endpoint: &str,
        gate: DeliveryGate,
        capacity: usize,
    ) -> Result<Self, ChannelError> {
        let source = connector.connect(endpoint).await?;
        let (tx, batches) = mpsc::channel(capacity.max(1));
        let shutdown = CancellationToken::new();
        let reader = tokio::spawn(read_frames(source, tx, gate.clone(), shutdown.clone()));

        Ok(Self {
            batches,
            gate,
            shutdown,
            reader: Some(reader),
        })
    }

    /// Next decoded batch. `None` once the connection ended or the channel was closed.
    pub async fn next_batch(&mut self) -> Option<Vec<Notification>> {
        if !self.gate.is_open() {
            return None;
        }
        let batch = self.batches.recv().await?;
        if !self.gate.is_open() {
            debug!("Dropping batch received after channel close");
            return None;
        }
        Some(batch)
    }

    pub fn is_open(&self) -> bool {
        self.gate.is_open() && !self.shutdown.is_cancelled()
    }

    /// Stop delivering batches and close the connection. Idempotent.
    pub fn close(&self) {
        self.gate.close();
        self.shutdown.cancel();
    }

    /// Wait until the reader task has closed the connection.
    pub async fn closed(&mut self) {
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!("Push channel reader task failed: {}", e);
            }
        }
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        // The reader closes the connection once cancelled
        self.shutdown.cancel();
    }
}

async fn read_frames(
    mut source: Box<dyn FrameSource>,
    tx: mpsc::Sender<Vec<Notification>>,
    gate: DeliveryGate,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = source.next_frame() => frame,
        };

        let text = match frame {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                warn!("Push channel error: {}", e);
                break;
            }
            None => {
                debug!("Push channel connection ended");
                break;
            }
        };

        match decode_frame(&text) {
            Ok(InboundFrame::Notifications(batch)) => {
                if !gate.is_open() {
                    debug!("Delivery gate closed, dropping frame");
                    continue;
                }
                debug!("Received {} notifications", batch.len());
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    sent = tx.send(batch) => {
                        if sent.is_err() {
                            debug!("Push channel consumer gone");
                            break;
                        }
                    }
                }
            }
            Ok(InboundFrame::Ignored(msg_type)) => {
                debug!("Ignoring push frame of type {:?}", msg_type);
            }
            Err(e) => {
                warn!("Dropping malformed push frame: {}", e);
            }
        }
    }

    if let Err(e) = source.close().await {
        debug!("Error closing push channel: {}", e);
    }
}
