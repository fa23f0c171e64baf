//! Relay server: shared state, WebSocket handler, and HTTP routes.
//!
//! Each peer opens a WebSocket on `/rtc/{room_id}`. The server assigns the
//! connection a fresh peer id, joins it to the room, and then passes every
//! inbound text frame to [`RoomRegistry::relay`] until the connection ends.
//! Whatever ends the connection, the peer is removed from its room exactly
//! once.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::peer::{Outbound, PeerSender};
use crate::rooms::RoomRegistry;

/// Default maximum size of a single WebSocket message in bytes (64 KB).
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Message returned by the health check route.
pub const HEALTH_MESSAGE: &str = "WebRTC Signaling Server Running for Video Streaming";

/// Shared relay server state.
pub struct SignalState {
    /// Room registry shared by every connection.
    pub rooms: RoomRegistry,
    /// Maximum accepted WebSocket message size in bytes.
    max_message_size: usize,
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalState {
    /// Creates a new state with an empty registry and the default message
    /// size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Creates a new state with a custom message size limit.
    #[must_use]
    pub fn with_config(max_message_size: usize) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            max_message_size,
        }
    }
}

/// Body of the health check response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HealthResponse {
    /// Fixed status message.
    pub message: &'static str,
    /// Number of rooms currently open.
    pub rooms: usize,
}

/// Handles an upgraded WebSocket connection for a single peer.
///
/// The connection lifecycle:
/// 1. Assign a fresh peer id and start the writer task.
/// 2. Join the room; a rejected peer gets the full-room notice and a close.
/// 3. Relay every inbound text frame to the other occupant.
/// 4. On disconnect, error, or panic in either task, leave the room.
pub async fn handle_socket(socket: WebSocket, room_id: String, state: Arc<SignalState>) {
    let peer_id = uuid::Uuid::new_v4().to_string();
    let (ws_sender, mut ws_receiver) = socket.split();

    tracing::info!(peer_id = %peer_id, room_id = %room_id, "connection opened");

    let (peer, rx) = PeerSender::channel();
    let mut write_task = tokio::spawn(write_outbound(ws_sender, rx, peer_id.clone()));

    if let Err(e) = state.rooms.join(&room_id, &peer_id, peer) {
        tracing::info!(peer_id = %peer_id, room_id = %room_id, error = %e, "join rejected");
        // The registry queued the notice and a close; let the writer flush them.
        if let Err(e) = write_task.await {
            tracing::warn!(peer_id = %peer_id, error = %e, "writer task failed");
        }
        return;
    }

    // Reader loop: every text frame is relayed in arrival order.
    let reader_peer_id = peer_id.clone();
    let reader_room_id = room_id.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    reader_state
                        .rooms
                        .relay(&reader_room_id, &reader_peer_id, text.as_str());
                }
                Ok(Message::Binary(data)) => {
                    tracing::warn!(
                        peer_id = %reader_peer_id,
                        len = data.len(),
                        "ignoring binary frame"
                    );
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(peer_id = %reader_peer_id, "received close frame");
                    break;
                }
                Ok(_) => {
                    // Ping/pong are answered by the transport.
                }
                Err(e) => {
                    tracing::warn!(peer_id = %reader_peer_id, error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        res = &mut read_task => {
            if let Err(e) = res {
                tracing::error!(peer_id = %peer_id, error = %e, "reader task failed");
            }
            write_task.abort();
        }
        res = &mut write_task => {
            if let Err(e) = res {
                tracing::error!(peer_id = %peer_id, error = %e, "writer task failed");
            }
            read_task.abort();
        }
    }

    state.rooms.leave(&room_id, &peer_id);
    tracing::info!(peer_id = %peer_id, room_id = %room_id, "peer disconnected");
}

/// Drains a peer's outbound queue into its WebSocket.
///
/// Ends after sending a close frame, when the queue is dropped, or when the
/// socket stops accepting writes.
async fn write_outbound(
    mut ws_sender: impl SinkExt<Message, Error = axum::Error> + Unpin,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    peer_id: String,
) {
    while let Some(out) = rx.recv().await {
        let (msg, last) = match out {
            Outbound::Text(text) => (Message::Text(text.into()), false),
            Outbound::Close => (Message::Close(None), true),
        };
        if let Err(e) = ws_sender.send(msg).await {
            tracing::warn!(peer_id = %peer_id, error = %e, "WebSocket write failed");
            break;
        }
        if last {
            break;
        }
    }
}

/// Starts the relay server on the given address and returns the bound address
/// and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(SignalState::new())).await
}

/// Starts the relay server with a pre-configured [`SignalState`].
///
/// Use [`SignalState::with_config`] to apply the message size limit from the
/// resolved [`crate::config::RelayConfig`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<SignalState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Builds the HTTP router for the relay.
pub fn router(state: Arc<SignalState>) -> axum::Router {
    axum::Router::new()
        .route("/", axum::routing::get(health_handler))
        .route("/rtc/{room_id}", axum::routing::get(ws_handler))
        .with_state(state)
}

/// Starts the relay server in-process for testing.
///
/// Binds to `127.0.0.1:0` (OS-assigned port) and returns the bound address
/// and a [`tokio::task::JoinHandle`] for cleanup.
#[cfg(test)]
pub async fn start_test_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server")
}

/// axum handler answering the health check.
async fn health_handler(State(state): State<Arc<SignalState>>) -> axum::Json<HealthResponse> {
    tracing::debug!("health check");
    axum::Json(health(&state))
}

/// Builds the health check body.
#[must_use]
pub fn health(state: &SignalState) -> HealthResponse {
    HealthResponse {
        message: HEALTH_MESSAGE,
        rooms: state.rooms.room_count(),
    }
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<Arc<SignalState>>,
) -> impl axum::response::IntoResponse {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, room_id, state))
}
