//! Axum transport for Rentflow live updates.
//!
//! Connects WebSocket clients to the runtime's
//! [`Broadcaster`](rentflow_runtime::Broadcaster):
//!
//! ```text
//! Client            /ws/bookings              Broadcaster
//!   │                    │                         │
//!   ├─ Connect ─────────>├─ register(id, session) >│
//!   │                    │                         │
//!   │<─ status update ───┤<── send_text ───────────┤
//!   │                    │                         │
//!   ├─ Close ───────────>├─ unregister(id) ───────>│
//! ```
//!
//! Inbound client messages carry no meaning and are only logged.
//!
//! # Example
//!
//! ```ignore
//! use rentflow_web::{router, WebState};
//!
//! let app = router(WebState::new(broadcaster));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod handlers;
pub mod state;

pub use handlers::websocket::WsSession;
pub use state::WebState;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Path of the live booking/payment status endpoint.
pub const LIVE_UPDATES_PATH: &str = "/ws/bookings";

/// Routes: `/health`, `/health/ready` and [`LIVE_UPDATES_PATH`].
pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness))
        .route(LIVE_UPDATES_PATH, get(handlers::websocket::booking_updates))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
