//! In-process push transport.
//!
//! Frames are handed over through a channel instead of a socket. Useful to
//! embed the sync machinery without a server, and in tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{ChannelError, FrameSource, PushConnector};

#[derive(Default)]
struct MemoryState {
    sender: Option<mpsc::UnboundedSender<String>>,
    connects: usize,
    closes: usize,
    refuse_connections: bool,
    close_delay: Duration,
}

/// [`PushConnector`] whose "server side" is driven by method calls.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a raw frame to the open connection. Returns false if none is open.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        let state = self.state.lock().unwrap();
        match &state.sender {
            Some(sender) => sender.send(frame.into()).is_ok(),
            None => false,
        }
    }

    /// Close the open connection from the server side.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().sender = None;
    }

    /// Make subsequent connection attempts fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connections = refuse;
    }

    /// Make the client side of every connection take `delay` to close.
    pub fn set_close_delay(&self, delay: Duration) {
        self.state.lock().unwrap().close_delay = delay;
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().sender.is_some()
    }

    /// Number of successful connections so far.
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Number of connections whose client side has been closed.
    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait]
impl PushConnector for MemoryConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameSource>, ChannelError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connections {
            return Err(ChannelError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        state.sender = Some(sender);
        state.connects += 1;
        Ok(Box::new(MemorySource {
            receiver,
            connection: state.connects,
            state: self.state.clone(),
            closed: false,
        }))
    }
}

struct MemorySource {
    receiver: mpsc::UnboundedReceiver<String>,
    connection: usize,
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>> {
        self.receiver.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.receiver.close();

        let delay = self.state.lock().unwrap().close_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.closes += 1;
        // A newer connection may already own the sender
        if state.connects == self.connection {
            state.sender = None;
        }
        Ok(())
    }
}
