//! Transport seam for the push channel, plus the WebSocket implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info};

/// How long to wait for the server to acknowledge a close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised by a push transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Opens connections to a push endpoint.
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameSource>, ChannelError>;
}

/// One open push connection, yielding raw text frames in wire order.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame. `None` once the connection is closed.
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>>;

    /// Close the connection. Safe to call on an already closed connection.
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// [`PushConnector`] over WebSocket.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameSource>, ChannelError> {
        info!("Connecting to push channel: {}", endpoint);
        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| ChannelError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        info!("Connected to push channel");
        Ok(Box::new(WebSocketSource {
            stream,
            closed: false,
        }))
    }
}

struct WebSocketSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl FrameSource for WebSocketSource {
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>> {
        if self.closed {
            return None;
        }
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        error!("Failed to send pong: {}", e);
                        return Some(Err(ChannelError::Transport(e.to_string())));
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Push channel closed by server");
                    self.closed = true;
                    return None;
                }
                Ok(Message::Binary(data)) => {
                    debug!("Ignoring binary frame of {} bytes", data.len());
                }
                Ok(_) => {}
                Err(e) => return Some(Err(ChannelError::Transport(e.to_string()))),
            }
        }
        self.closed = true;
        None
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) => {}
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                return Ok(())
            }
            Err(e) => return Err(ChannelError::Transport(e.to_string())),
        }

        // Wait for the server's close frame so the handshake completes
        let drain = async { while let Some(Ok(_)) = self.stream.next().await {} };
        if tokio::time::timeout(CLOSE_TIMEOUT, drain).await.is_err() {
            debug!("Server did not acknowledge close within {:?}", CLOSE_TIMEOUT);
        }
        Ok(())
    }
}
