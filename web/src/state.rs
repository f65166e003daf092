//! Shared state for the Axum handlers.

use rentflow_runtime::Broadcaster;
use std::sync::Arc;

/// State handed to every handler.
#[derive(Clone)]
pub struct WebState {
    /// Registry that live sessions join
    pub broadcaster: Arc<Broadcaster>,
}

impl WebState {
    /// Wrap the process-wide broadcaster.
    #[must_use]
    pub const fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }
}
