use crate::{PostgresRentalStore, column, storage};
use rentflow_core::repository::{PaymentRepository, RepositoryError, Result};
use rentflow_core::types::{BookingId, Money, NewPayment, Payment, PaymentId, PaymentStatus};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;

const PAYMENT_COLUMNS: &str = "id, booking_id, amount, payment_method, status";

fn payment_from_row(row: &PgRow) -> Result<Payment> {
    let status: String = column(row, "status")?;
    let status = PaymentStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Corrupt(format!("unknown payment status {status}")))?;

    Ok(Payment {
        id: PaymentId::new(column(row, "id")?),
        booking_id: BookingId::new(column(row, "booking_id")?),
        amount: Money::new(column::<Decimal>(row, "amount")?),
        payment_method: column(row, "payment_method")?,
        status,
    })
}

impl PaymentRepository for PostgresRentalStore {
    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("get payment"))?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1 ORDER BY id"
        ))
        .bind(booking_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list payments"))?;

        rows.iter().map(payment_from_row).collect()
    }

    async fn insert(&self, payment: NewPayment) -> Result<Payment> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO payments (booking_id, amount, payment_method, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(payment.booking_id.value())
        .bind(payment.amount.amount())
        .bind(&payment.payment_method)
        .bind(payment.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage("insert payment"))?;

        Ok(payment.with_id(PaymentId::new(id)))
    }

    async fn update_status(
        &self,
        id: PaymentId,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE payments SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.value())
            .bind(expected.as_str())
            .bind(next.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage("update payment status"))?;

        Ok(result.rows_affected() == 1)
    }
}
