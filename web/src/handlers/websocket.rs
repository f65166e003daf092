//! WebSocket endpoint for live booking and payment status updates.
//!
//! # Protocol
//!
//! ```text
//! ws://localhost:8080/ws/bookings
//! ```
//!
//! **Server → Client:**
//! ```json
//! {
//!   "type": "booking_status_update",
//!   "payload": { "bookingId": 5, "status": "CONFIRMED" },
//!   "timestamp": "2024-06-01T10:00:00.000Z"
//! }
//! ```
//!
//! Client frames are logged and dropped.

use crate::state::WebState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use rentflow_core::session::{LiveSession, SessionError, SessionId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Frames buffered per connection before sends fail as lagging.
pub const OUTBOUND_BUFFER: usize = 64;

/// Broadcaster-facing handle to one WebSocket connection.
///
/// Frames are queued on a bounded channel drained by the connection's
/// writer task, so `send_text` never waits on the network. A client that
/// stops reading fills the buffer; further frames are refused with
/// [`SessionError::Lagging`] until it catches up.
pub struct WsSession {
    outbound: mpsc::Sender<String>,
    open: AtomicBool,
}

impl WsSession {
    /// Handle feeding `outbound`.
    #[must_use]
    pub const fn new(outbound: mpsc::Sender<String>) -> Self {
        Self {
            outbound,
            open: AtomicBool::new(true),
        }
    }

    /// Mark the connection closed; later sends fail with [`SessionError::Closed`].
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl LiveSession for WsSession {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    fn send_text(&self, text: &str) -> Result<(), SessionError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        self.outbound
            .try_send(text.to_string())
            .map_err(|e| match e {
                TrySendError::Full(_) => SessionError::Lagging,
                TrySendError::Closed(_) => SessionError::Closed,
            })
    }
}

/// Upgrade to a live-update session.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn booking_updates(ws: WebSocketUpgrade, State(state): State<WebState>) -> Response {
    debug!("WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one connection: register, pump frames, unregister on close or error.
async fn handle_socket(socket: WebSocket, state: WebState) {
    let session_id = SessionId::new(Uuid::new_v4().to_string());
    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut queued) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let session = Arc::new(WsSession::new(outbound));
    state
        .broadcaster
        .register(session_id.clone(), Arc::clone(&session) as Arc<dyn LiveSession>);

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = queued.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_id = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    debug!(session_id = %recv_id, message = %text, "Ignoring client message");
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(session_id = %recv_id, error = %e, "WebSocket transport error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    session.close();
    state.broadcaster.unregister(&session_id);
    info!(session_id = %session_id, "WebSocket connection closed");
}
