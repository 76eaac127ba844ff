//! Mock notifications server lifecycle management
//!
//! Each test gets an isolated server on a random port with its own
//! notification list and WebSocket clients.

use super::constants::*;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use pezzottify_notification_sync::channel::PushFrame;
use pezzottify_notification_sync::{Notification, User};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Default)]
struct MockState {
    notifications: Mutex<Vec<Notification>>,
    users: Mutex<Vec<User>>,
    clients: Mutex<Vec<mpsc::UnboundedSender<String>>>,
    fetch_requests: Mutex<Vec<Option<String>>>,
    fail_fetches: AtomicBool,
}

impl MockState {
    fn broadcast(&self, frame: String) -> usize {
        let mut clients = self.clients.lock().unwrap();
        clients.retain(|client| client.send(frame.clone()).is_ok());
        clients.len()
    }
}

type SharedState = Arc<MockState>;

/// Mock notifications server
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for HTTP requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// WebSocket push endpoint (e.g., "ws://127.0.0.1:12345/ws")
    pub ws_url: String,

    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new mock server on a random port, with the test users and
    /// no notifications.
    ///
    /// # Panics
    ///
    /// Panics if port binding fails or the server doesn't become ready
    /// within timeout.
    pub async fn spawn() -> Self {
        let state: SharedState = Arc::new(MockState::default());
        *state.users.lock().unwrap() = test_users();

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/users", get(get_users))
            .route("/notifications", get(get_notifications))
            .route("/notifications/generate", post(generate_notifications))
            .route("/ws", get(ws_handler))
            .with_state(state.clone());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            ws_url: format!("ws://127.0.0.1:{}/ws", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Add notifications to what the server returns on fetch, without pushing them.
    pub fn add_notifications(&self, notifications: Vec<Notification>) {
        self.state
            .notifications
            .lock()
            .unwrap()
            .extend(notifications);
    }

    /// Store notifications and push them to every connected client.
    ///
    /// Returns the number of clients the frame was sent to.
    pub fn push_notifications(&self, notifications: Vec<Notification>) -> usize {
        let frame = serde_json::to_string(&PushFrame::notifications(&notifications))
            .expect("Failed to serialize frame");
        self.add_notifications(notifications);
        self.state.broadcast(frame)
    }

    /// Push a raw text frame to every connected client.
    pub fn push_raw(&self, frame: &str) -> usize {
        self.state.broadcast(frame.to_string())
    }

    /// Number of WebSocket clients currently connected.
    pub fn connected_clients(&self) -> usize {
        let mut clients = self.state.clients.lock().unwrap();
        clients.retain(|client| !client.is_closed());
        clients.len()
    }

    /// Close every WebSocket connection from the server side.
    pub fn disconnect_clients(&self) {
        self.state.clients.lock().unwrap().clear();
    }

    /// Make `GET /notifications` answer with a 500.
    pub fn set_fetch_failure(&self, fail: bool) {
        self.state.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// The `since` parameter of every `GET /notifications` received so far.
    pub fn fetch_requests(&self) -> Vec<Option<String>> {
        self.state.fetch_requests.lock().unwrap().clone()
    }

    /// Waits until `count` WebSocket clients are connected.
    pub async fn wait_for_clients(&self, count: usize) {
        let start = std::time::Instant::now();
        while self.connected_clients() != count {
            if start.elapsed() > Duration::from_millis(WAIT_TIMEOUT_MS) {
                panic!(
                    "Expected {} WebSocket clients, have {}",
                    count,
                    self.connected_clients()
                );
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }

    /// Waits for the server to become ready by polling the root endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn get_users(State(state): State<SharedState>) -> Json<Vec<User>> {
    Json(state.users.lock().unwrap().clone())
}

async fn get_notifications(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let since = params.get("since").cloned();
    state.fetch_requests.lock().unwrap().push(since.clone());

    if state.fail_fetches.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut notifications: Vec<Notification> = state
        .notifications
        .lock()
        .unwrap()
        .iter()
        .filter(|n| since.as_deref().map_or(true, |since| n.date.as_str() > since))
        .cloned()
        .collect();
    notifications.sort_by(|a, b| b.date.cmp(&a.date));
    Json(notifications).into_response()
}

#[derive(Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    since: String,
}

/// Creates one notification dated now and pushes it to every client.
async fn generate_notifications(
    State(state): State<SharedState>,
    Json(request): Json<GenerateRequest>,
) -> Json<Vec<Notification>> {
    let generated = vec![Notification::new(
        uuid::Uuid::new_v4().to_string(),
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        format!("Generated after '{}'", request.since),
        USER_1_ID,
    )];

    let frame = serde_json::to_string(&PushFrame::notifications(&generated))
        .expect("Failed to serialize frame");
    state
        .notifications
        .lock()
        .unwrap()
        .extend(generated.iter().cloned());
    state.broadcast(frame);
    Json(generated)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: SharedState) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.clients.lock().unwrap().push(tx);

    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                // Dropped by disconnect_clients()
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
