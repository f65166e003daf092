use crate::{PostgresRentalStore, column, storage};
use rentflow_core::repository::{BookingRepository, RepositoryError, Result};
use rentflow_core::types::{
    Booking, BookingId, BookingStatus, Money, NewBooking, UserId, VehicleId,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;

const BOOKING_COLUMNS: &str =
    "id, vehicle_id, user_id, start_date, end_date, status, total_cost, created_at";

fn booking_from_row(row: &PgRow) -> Result<Booking> {
    let status: String = column(row, "status")?;
    let status = BookingStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Corrupt(format!("unknown booking status {status}")))?;

    Ok(Booking {
        id: BookingId::new(column(row, "id")?),
        vehicle_id: VehicleId::new(column(row, "vehicle_id")?),
        user_id: UserId::new(column(row, "user_id")?),
        start_date: column(row, "start_date")?,
        end_date: column(row, "end_date")?,
        status,
        total_cost: Money::new(column::<Decimal>(row, "total_cost")?),
        created_at: column(row, "created_at")?,
    })
}

impl BookingRepository for PostgresRentalStore {
    async fn find_by_id(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("get booking"))?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list bookings"))?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn insert(&self, booking: NewBooking) -> Result<Booking> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO bookings (
                vehicle_id, user_id, start_date, end_date, status, total_cost, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(booking.vehicle_id.value())
        .bind(booking.user_id.value())
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.status.as_str())
        .bind(booking.total_cost.amount())
        .bind(booking.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("insert booking"))?;

        Ok(booking.with_id(BookingId::new(id)))
    }

    async fn update_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.value())
            .bind(expected.as_str())
            .bind(next.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage("update booking status"))?;

        Ok(result.rows_affected() == 1)
    }
}
