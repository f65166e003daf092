//! Domain types for the rental booking workflow.
//!
//! Identifiers are numeric because they travel on the wire as JSON numbers
//! (`{"bookingId":5}`) and are assigned by the durable store on insert.
//! Entities serialize with camelCase field names, which is also the format
//! of the availability cache snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw store-assigned identifier.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// The raw identifier value.
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a rentable vehicle
    VehicleId
);
numeric_id!(
    /// Identifier of a booking
    BookingId
);
numeric_id!(
    /// Identifier of the user who owns bookings and notifications
    UserId
);
numeric_id!(
    /// Identifier of a payment
    PaymentId
);
numeric_id!(
    /// Identifier of a notification
    NotificationId
);

// ============================================================================
// Money
// ============================================================================

/// Exact decimal currency amount.
///
/// Rates and costs are never represented as floats. Negative values are
/// representable so that invalid input can be rejected by validation
/// instead of failing to parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Whole-unit amount (e.g. `Money::from_units(50)` is 50.00).
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// True when strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiply by a whole number of units (days), `None` on overflow.
    #[must_use]
    pub fn checked_times(&self, count: i64) -> Option<Self> {
        self.0.checked_mul(Decimal::from(count)).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Vehicle
// ============================================================================

/// A rentable vehicle, owned by the availability domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Store-assigned identity
    pub id: VehicleId,
    /// Vehicle details
    #[serde(flatten)]
    pub details: VehicleDetails,
}

/// Everything about a vehicle except its identity.
///
/// Used both as the payload of add/update operations and, flattened, as
/// the body of a [`Vehicle`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetails {
    /// Manufacturer
    pub make: String,
    /// Model name
    pub model: String,
    /// Model year
    pub year: i32,
    /// Pickup location the vehicle is searchable by
    pub location: String,
    /// Price per rental day
    pub daily_rate: Money,
    /// Vehicle class (sedan, SUV, ...)
    #[serde(rename = "type")]
    pub vehicle_type: String,
    /// Registration plate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
    /// Paint colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Fuel type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    /// Transmission type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    /// Seat count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats: Option<i32>,
    /// Marketing image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl VehicleDetails {
    /// Minimal vehicle description with all optional fields unset.
    #[must_use]
    pub fn new(
        make: impl Into<String>,
        model: impl Into<String>,
        year: i32,
        location: impl Into<String>,
        daily_rate: Money,
        vehicle_type: impl Into<String>,
    ) -> Self {
        Self {
            make: make.into(),
            model: model.into(),
            year,
            location: location.into(),
            daily_rate,
            vehicle_type: vehicle_type.into(),
            license_plate: None,
            color: None,
            fuel_type: None,
            transmission: None,
            seats: None,
            image_url: None,
        }
    }
}

// ============================================================================
// Booking
// ============================================================================

/// Lifecycle state of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created, holding the vehicle, awaiting confirmation
    Pending,
    /// Confirmed by the customer
    Confirmed,
    /// Cancelled (terminal)
    Cancelled,
}

impl BookingStatus {
    /// Whether a booking in this status blocks the vehicle for its date range.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether `self -> next` is a permitted lifecycle transition.
    ///
    /// `Confirmed -> Confirmed` is allowed so a repeated confirmation is an
    /// idempotent re-publish rather than an error.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Confirmed | Self::Cancelled)
        )
    }

    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the wire/database representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of billable days for an inclusive date range.
///
/// Whole days between the dates, with a floor of one: a same-day rental is
/// billed as one day, never zero.
#[must_use]
pub fn billable_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// A vehicle booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Store-assigned identity
    pub id: BookingId,
    /// Booked vehicle
    pub vehicle_id: VehicleId,
    /// Owning user
    pub user_id: UserId,
    /// First day (inclusive)
    pub start_date: NaiveDate,
    /// Last day (inclusive)
    pub end_date: NaiveDate,
    /// Lifecycle state
    pub status: BookingStatus,
    /// Derived once at creation, never recomputed
    pub total_cost: Money,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Whether this booking's range intersects `[start, end]`.
    #[must_use]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && self.end_date >= start
    }
}

/// A booking that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBooking {
    /// Booked vehicle
    pub vehicle_id: VehicleId,
    /// Owning user
    pub user_id: UserId,
    /// First day (inclusive)
    pub start_date: NaiveDate,
    /// Last day (inclusive)
    pub end_date: NaiveDate,
    /// Initial status
    pub status: BookingStatus,
    /// Derived total
    pub total_cost: Money,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    /// Attach a store-assigned identity.
    #[must_use]
    pub fn with_id(self, id: BookingId) -> Booking {
        Booking {
            id,
            vehicle_id: self.vehicle_id,
            user_id: self.user_id,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
            total_cost: self.total_cost,
            created_at: self.created_at,
        }
    }
}

// ============================================================================
// Payment
// ============================================================================

/// Payment state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Recorded, not yet settled
    Pending,
    /// Settled
    Completed,
    /// Returned to the payer
    Refunded,
}

impl PaymentStatus {
    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// Parse the wire/database representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment against a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Store-assigned identity
    pub id: PaymentId,
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Amount charged (always > 0)
    pub amount: Money,
    /// Free-form payment method ("card", "paypal", ...)
    pub payment_method: String,
    /// Current state
    pub status: PaymentStatus,
}

/// A payment that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPayment {
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Amount charged
    pub amount: Money,
    /// Payment method
    pub payment_method: String,
    /// Initial status
    pub status: PaymentStatus,
}

impl NewPayment {
    /// Attach a store-assigned identity.
    #[must_use]
    pub fn with_id(self, id: PaymentId) -> Payment {
        Payment {
            id,
            booking_id: self.booking_id,
            amount: self.amount,
            payment_method: self.payment_method,
            status: self.status,
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Read state of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    /// Not yet acknowledged
    Unread,
    /// Acknowledged by the user
    Read,
}

impl NotificationStatus {
    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "UNREAD",
            Self::Read => "READ",
        }
    }

    /// Parse the wire/database representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UNREAD" => Some(Self::Unread),
            "READ" => Some(Self::Read),
            _ => None,
        }
    }
}

/// A user-facing notification produced by event consumption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Store-assigned identity
    pub id: NotificationId,
    /// Recipient
    pub user_id: UserId,
    /// Event tag that produced it (e.g. `booking_created`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable text
    pub message: String,
    /// Read state
    pub status: NotificationStatus,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

/// A notification that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNotification {
    /// Recipient
    pub user_id: UserId,
    /// Event tag
    pub kind: String,
    /// Text
    pub message: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Attach a store-assigned identity; new notifications start unread.
    #[must_use]
    pub fn with_id(self, id: NotificationId) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            kind: self.kind,
            message: self.message,
            status: NotificationStatus::Unread,
            created_at: self.created_at,
        }
    }
}
