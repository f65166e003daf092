//! Health check endpoints.
//!
//! Used by load balancers and monitoring systems to verify the process is up.

use crate::state::WebState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Liveness probe.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    /// Always `"ok"` once the server is accepting requests
    pub status: &'static str,
    /// Currently registered live sessions
    pub live_sessions: usize,
}

/// Readiness probe with live-session count.
///
/// ```text
/// GET /health/ready
/// {"status":"ok","liveSessions":3}
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness(State(state): State<WebState>) -> Json<Readiness> {
    Json(Readiness {
        status: "ok",
        live_sessions: state.broadcaster.count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentflow_runtime::Broadcaster;
    use rentflow_testing::{RecordingSession, test_clock};
    use rentflow_core::session::SessionId;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn readiness_reports_live_sessions() {
        let broadcaster = Arc::new(Broadcaster::new(Arc::new(test_clock())));
        broadcaster.register(SessionId::new("a"), Arc::new(RecordingSession::new()));

        let Json(report) = readiness(State(WebState::new(broadcaster))).await;
        assert_eq!(report.live_sessions, 1);
    }
}
