//! Live session that records frames.

use rentflow_core::session::{LiveSession, SessionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// [`LiveSession`] that keeps every frame it is sent.
///
/// **WARNING**: Do NOT use in production. This is for testing only!
#[derive(Debug)]
pub struct RecordingSession {
    frames: Mutex<Vec<String>>,
    open: AtomicBool,
    failing: bool,
}

impl RecordingSession {
    /// Open session that accepts frames.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            failing: false,
        }
    }

    /// Open session whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// Mark the connection closed.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Frames received so far.
    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// Frames parsed as JSON.
    #[must_use]
    pub fn frames_json(&self) -> Vec<serde_json::Value> {
        self.frames()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSession for RecordingSession {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
    fn send_text(&self, text: &str) -> Result<(), SessionError> {
        if self.failing {
            return Err(SessionError::Transport("simulated send failure".to_string()));
        }
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
