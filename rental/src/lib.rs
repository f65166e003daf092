//! # Rentflow rental services
//!
//! The booking workflow of a vehicle rental platform. Services share no
//! transaction: they coordinate through a per-vehicle reservation lock, a
//! cached vehicle snapshot and events on `booking-events` and
//! `payment-events`.
//!
//! ```text
//! create ─> lock vehicle ─> store PENDING ─> publish booking_created
//!                                                   │
//!             ┌─────────────────────┬───────────────┴─────────┐
//!             ▼                     ▼                         ▼
//!     availability group   notification group         websocket group
//!      (refresh cache)    (write notification)     (broadcast live update)
//! ```
//!
//! - [`booking`]: booking state machine
//! - [`payment`]: payment processing and refunds
//! - [`availability`]: read-through vehicle cache, search, vehicle admin
//! - [`notification`]: user notifications
//! - [`handlers`]: event reactions per downstream service
//! - [`app`]: wiring and consumers
//! - [`lifecycle`]: run and graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod availability;
pub mod booking;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod notification;
pub mod payment;
pub mod publisher;

pub use app::{RentalServices, RentalStore};
pub use config::Config;
pub use error::{RentalError, Result};
pub use lifecycle::Application;
