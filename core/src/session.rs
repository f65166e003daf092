//! Live client sessions.
//!
//! A session is an ephemeral, send-capable handle to one connected client.
//! The transport (WebSocket in production) owns the connection; the fanout
//! registry only holds the handle between open and close notifications.

use std::fmt;
use thiserror::Error;

/// Transport-assigned session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a transport identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure to hand a frame to a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Connection already closed
    #[error("Session closed")]
    Closed,

    /// Client is not reading; its outbound buffer is full
    #[error("Session lagging: outbound buffer full")]
    Lagging,

    /// Transport rejected the frame
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Send-capable handle to a connected client.
///
/// `send_text` must not block: implementations queue the frame for the
/// connection's writer and return.
pub trait LiveSession: Send + Sync {
    /// Whether the underlying connection is still open.
    fn is_open(&self) -> bool;

    /// Queue a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the frame cannot be queued.
    fn send_text(&self, text: &str) -> Result<(), SessionError>;
}
