//! Fanout broadcaster: push one status update to every live session.
//!
//! The registry maps a transport-assigned [`SessionId`] to a
//! [`LiveSession`] handle. The transport registers a handle when a
//! connection opens and unregisters it on close; the broadcaster never
//! removes a handle on its own, not even after a failed send.
//!
//! Each broadcast serializes the envelope once:
//!
//! ```text
//! {"type":"booking_status_update","payload":{"bookingId":5,"status":"CONFIRMED"},"timestamp":"2024-06-01T10:00:00.000Z"}
//! {"type":"payment_status_update","payload":{"paymentId":9,"bookingId":5,"status":"COMPLETED"},"timestamp":"..."}
//! ```

use crate::consumer::HandlerError;
use crate::metrics::BroadcastMetrics;
use crate::router::RentalEventHandler;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rentflow_core::environment::Clock;
use rentflow_core::session::{LiveSession, SessionId};
use rentflow_core::types::{BookingId, BookingStatus, PaymentId, PaymentStatus, UserId, VehicleId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Broadcast failures. Per-session send failures are not errors.
#[derive(Error, Debug)]
pub enum BroadcastError {
    /// Envelope could not be serialized
    #[error("Failed to serialize live update: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Envelope kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Booking status changed
    BookingStatusUpdate,
    /// Payment status changed
    PaymentStatusUpdate,
}

/// Status shown to live clients.
///
/// Payment failures have no stored payment status but are still pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveStatus {
    /// Booking awaiting confirmation
    Pending,
    /// Booking confirmed
    Confirmed,
    /// Booking cancelled
    Cancelled,
    /// Payment settled
    Completed,
    /// Payment declined
    Failed,
    /// Payment refunded
    Refunded,
}

impl From<BookingStatus> for LiveStatus {
    fn from(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Pending => Self::Pending,
            BookingStatus::Confirmed => Self::Confirmed,
            BookingStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<PaymentStatus> for LiveStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => Self::Pending,
            PaymentStatus::Completed => Self::Completed,
            PaymentStatus::Refunded => Self::Refunded,
        }
    }
}

/// Envelope payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UpdatePayload {
    /// Booking status payload
    #[serde(rename_all = "camelCase")]
    Booking {
        /// Booking
        booking_id: BookingId,
        /// New status
        status: LiveStatus,
    },
    /// Payment status payload
    #[serde(rename_all = "camelCase")]
    Payment {
        /// Payment
        payment_id: PaymentId,
        /// Booking paid for
        booking_id: BookingId,
        /// New status
        status: LiveStatus,
    },
}

/// `{type, payload, timestamp}` envelope pushed to live clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LiveUpdate {
    /// Envelope kind
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// Status payload
    pub payload: UpdatePayload,
    /// ISO-8601 instant, UTC
    pub timestamp: String,
}

impl LiveUpdate {
    /// Booking status envelope.
    #[must_use]
    pub fn booking(booking_id: BookingId, status: BookingStatus, at: DateTime<Utc>) -> Self {
        Self {
            kind: UpdateKind::BookingStatusUpdate,
            payload: UpdatePayload::Booking {
                booking_id,
                status: status.into(),
            },
            timestamp: iso_instant(at),
        }
    }

    /// Payment status envelope.
    #[must_use]
    pub fn payment(
        payment_id: PaymentId,
        booking_id: BookingId,
        status: LiveStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: UpdateKind::PaymentStatusUpdate,
            payload: UpdatePayload::Payment {
                payment_id,
                booking_id,
                status,
            },
            timestamp: iso_instant(at),
        }
    }
}

fn iso_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions the frame was queued to
    pub sent: usize,
    /// Open sessions that refused the frame
    pub failed: usize,
    /// Registered sessions skipped because they were closed
    pub skipped: usize,
}

/// Concurrency-safe registry of live sessions.
pub struct Broadcaster {
    sessions: RwLock<HashMap<SessionId, Arc<dyn LiveSession>>>,
    clock: Arc<dyn Clock>,
}

impl Broadcaster {
    /// Empty registry stamping envelopes with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Add or replace a session.
    pub fn register(&self, id: SessionId, session: Arc<dyn LiveSession>) {
        let count = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.insert(id.clone(), session);
            sessions.len()
        };
        BroadcastMetrics::record_sessions(count);
        tracing::info!(session_id = %id, live_sessions = count, "Live session registered");
    }

    /// Remove a session. Returns whether it was registered.
    pub fn unregister(&self, id: &SessionId) -> bool {
        let (removed, count) = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let removed = sessions.remove(id).is_some();
            (removed, sessions.len())
        };
        BroadcastMetrics::record_sessions(count);
        tracing::info!(session_id = %id, live_sessions = count, "Live session unregistered");
        removed
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Current time from the broadcaster's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Send `update` to every open session.
    ///
    /// A failure on one session is logged and does not affect the others or
    /// the registry.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Serialize`] if the envelope cannot be encoded.
    pub fn broadcast(&self, update: &LiveUpdate) -> Result<BroadcastReport, BroadcastError> {
        let text = serde_json::to_string(update)?;

        let targets: Vec<(SessionId, Arc<dyn LiveSession>)> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, session)| (id.clone(), Arc::clone(session)))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, session) in targets {
            if !session.is_open() {
                report.skipped += 1;
                continue;
            }
            match session.send_text(&text) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(session_id = %id, error = %e, "Failed to push live update");
                }
            }
        }

        BroadcastMetrics::record_broadcast(report.sent, report.failed);
        tracing::debug!(
            kind = ?update.kind,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "Live update broadcast"
        );
        Ok(report)
    }
}

/// Maps booking and payment events to live updates.
pub struct LiveUpdateHandler {
    broadcaster: Arc<Broadcaster>,
}

impl LiveUpdateHandler {
    /// Broadcast through `broadcaster`.
    #[must_use]
    pub const fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }

    fn push(&self, update: &LiveUpdate) -> Result<(), HandlerError> {
        self.broadcaster
            .broadcast(update)
            .map(|_| ())
            .map_err(|e| HandlerError::Failed(e.to_string()))
    }

    fn booking(&self, booking_id: BookingId, status: BookingStatus) -> Result<(), HandlerError> {
        self.push(&LiveUpdate::booking(
            booking_id,
            status,
            self.broadcaster.now(),
        ))
    }

    fn payment(
        &self,
        payment_id: PaymentId,
        booking_id: BookingId,
        status: LiveStatus,
    ) -> Result<(), HandlerError> {
        self.push(&LiveUpdate::payment(
            payment_id,
            booking_id,
            status,
            self.broadcaster.now(),
        ))
    }
}

#[async_trait]
impl RentalEventHandler for LiveUpdateHandler {
    async fn booking_created(
        &self,
        booking_id: BookingId,
        _vehicle_id: VehicleId,
        _user_id: UserId,
    ) -> Result<(), HandlerError> {
        self.booking(booking_id, BookingStatus::Pending)
    }

    async fn booking_confirmed(&self, booking_id: BookingId) -> Result<(), HandlerError> {
        self.booking(booking_id, BookingStatus::Confirmed)
    }

    async fn booking_cancelled(&self, booking_id: BookingId) -> Result<(), HandlerError> {
        self.booking(booking_id, BookingStatus::Cancelled)
    }

    async fn payment_completed(
        &self,
        payment_id: PaymentId,
        booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        self.payment(payment_id, booking_id, LiveStatus::Completed)
    }

    async fn payment_failed(
        &self,
        payment_id: PaymentId,
        booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        self.payment(payment_id, booking_id, LiveStatus::Failed)
    }

    async fn payment_refunded(
        &self,
        payment_id: PaymentId,
        booking_id: BookingId,
    ) -> Result<(), HandlerError> {
        self.payment(payment_id, booking_id, LiveStatus::Refunded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::consumer::MessageHandler;
    use crate::router::EventRouter;
    use rentflow_core::event::BOOKING_EVENTS;
    use rentflow_core::event_bus::BusMessage;
    use rentflow_testing::{FixedClock, RecordingSession};

    fn broadcaster() -> Arc<Broadcaster> {
        Arc::new(Broadcaster::new(Arc::new(FixedClock::at(
            "2024-06-01T10:00:00Z",
        ))))
    }

    #[test]
    fn booking_envelope_matches_wire_format() {
        let at = "2024-06-01T10:00:00Z".parse().unwrap();
        let update = LiveUpdate::booking(BookingId::new(5), BookingStatus::Confirmed, at);

        let json: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "booking_status_update",
                "payload": {"bookingId": 5, "status": "CONFIRMED"},
                "timestamp": "2024-06-01T10:00:00.000Z"
            })
        );
    }

    #[test]
    fn payment_envelope_carries_both_ids() {
        let at = "2024-06-01T10:00:00Z".parse().unwrap();
        let update = LiveUpdate::payment(PaymentId::new(9), BookingId::new(5), LiveStatus::Failed, at);

        let json: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "payment_status_update");
        assert_eq!(
            json["payload"],
            serde_json::json!({"paymentId": 9, "bookingId": 5, "status": "FAILED"})
        );
    }

    #[test]
    fn register_unregister_count() {
        let broadcaster = broadcaster();
        broadcaster.register(SessionId::new("a"), Arc::new(RecordingSession::new()));
        broadcaster.register(SessionId::new("b"), Arc::new(RecordingSession::new()));
        assert_eq!(broadcaster.count(), 2);

        assert!(broadcaster.unregister(&SessionId::new("a")));
        assert!(!broadcaster.unregister(&SessionId::new("a")));
        assert_eq!(broadcaster.count(), 1);
    }

    #[test]
    fn failing_session_does_not_block_others_and_stays_registered() {
        let broadcaster = broadcaster();
        let healthy = Arc::new(RecordingSession::new());
        let failing = Arc::new(RecordingSession::failing());
        let closed = Arc::new(RecordingSession::new());
        closed.close();

        broadcaster.register(SessionId::new("healthy"), healthy.clone());
        broadcaster.register(SessionId::new("failing"), failing.clone());
        broadcaster.register(SessionId::new("closed"), closed.clone());

        let update = LiveUpdate::booking(BookingId::new(1), BookingStatus::Pending, broadcaster.now());
        let report = broadcaster.broadcast(&update).unwrap();

        assert_eq!(
            report,
            BroadcastReport {
                sent: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(healthy.frames().len(), 1);
        assert!(closed.frames().is_empty());
        assert_eq!(broadcaster.count(), 3);
    }

    #[tokio::test]
    async fn duplicate_confirmed_event_broadcasts_twice_identically() {
        let broadcaster = broadcaster();
        let session = Arc::new(RecordingSession::new());
        broadcaster.register(SessionId::new("s"), session.clone());

        let router = EventRouter::new(Arc::new(LiveUpdateHandler::new(Arc::clone(&broadcaster))));
        let message = BusMessage::new(
            BOOKING_EVENTS,
            br#"{"event":"booking_confirmed","bookingId":5}"#.to_vec(),
        );
        router.handle(&message).await.unwrap();
        router.handle(&message).await.unwrap();

        let frames = session.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
        assert!(frames[0].contains(r#""status":"CONFIRMED""#));
    }
}
