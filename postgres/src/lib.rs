//! `PostgreSQL` repositories for Rentflow.
//!
//! One [`PostgresRentalStore`] implements every repository trait from
//! `rentflow-core` over a shared connection pool:
//!
//! - [`VehicleRepository`](rentflow_core::repository::VehicleRepository),
//!   including the composite availability query
//! - [`BookingRepository`](rentflow_core::repository::BookingRepository)
//! - [`PaymentRepository`](rentflow_core::repository::PaymentRepository)
//! - [`NotificationRepository`](rentflow_core::repository::NotificationRepository)
//!
//! Queries are built at runtime (`sqlx::query` + [`Row`](sqlx::Row)), so the
//! crate compiles without a database.
//!
//! # Example
//!
//! ```no_run
//! use rentflow_postgres::PostgresRentalStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresRentalStore::connect("postgres://localhost/rentflow", 10).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod booking;
mod notification;
mod payment;
mod vehicle;

use rentflow_core::repository::{RepositoryError, Result};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};

/// `PostgreSQL`-backed durable store.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PostgresRentalStore {
    pool: PgPool,
}

impl PostgresRentalStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] if the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Storage(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "PostgreSQL pool ready");
        Ok(Self { pool })
    }

    /// Run the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a query failure.
fn storage(action: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| RepositoryError::Storage(format!("Failed to {action}: {e}"))
}

/// Read one column, treating type mismatches as corruption.
fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Corrupt(format!("column {name}: {e}")))
}

/// Fail with `Missing` when an update touched no row.
const fn require_row(rows_affected: u64, entity: &'static str, id: i64) -> Result<()> {
    if rows_affected == 0 {
        Err(RepositoryError::Missing { entity, id })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_missing() {
        assert_eq!(
            require_row(0, "booking", 9),
            Err(RepositoryError::Missing {
                entity: "booking",
                id: 9
            })
        );
        assert_eq!(require_row(1, "booking", 9), Ok(()));
    }

    #[test]
    fn store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<PostgresRentalStore>();
    }
}
