use crate::{PostgresRentalStore, column, require_row, storage};
use chrono::NaiveDate;
use rentflow_core::repository::{Result, VehicleRepository};
use rentflow_core::types::{Money, Vehicle, VehicleDetails, VehicleId};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;

const VEHICLE_COLUMNS: &str = "id, make, model, year, location, daily_rate, vehicle_type, \
     license_plate, color, fuel_type, transmission, seats, image_url";

fn vehicle_from_row(row: &PgRow) -> Result<Vehicle> {
    Ok(Vehicle {
        id: VehicleId::new(column(row, "id")?),
        details: VehicleDetails {
            make: column(row, "make")?,
            model: column(row, "model")?,
            year: column(row, "year")?,
            location: column(row, "location")?,
            daily_rate: Money::new(column::<Decimal>(row, "daily_rate")?),
            vehicle_type: column(row, "vehicle_type")?,
            license_plate: column(row, "license_plate")?,
            color: column(row, "color")?,
            fuel_type: column(row, "fuel_type")?,
            transmission: column(row, "transmission")?,
            seats: column(row, "seats")?,
            image_url: column(row, "image_url")?,
        },
    })
}

impl VehicleRepository for PostgresRentalStore {
    async fn find_by_id(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        let row = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("get vehicle"))?;

        row.as_ref().map(vehicle_from_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(storage("list vehicles"))?;

        rows.iter().map(vehicle_from_row).collect()
    }

    async fn find_available(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        location: &str,
    ) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {VEHICLE_COLUMNS}
            FROM vehicles v
            WHERE v.location = $1
              AND NOT EXISTS (
                  SELECT 1 FROM bookings b
                  WHERE b.vehicle_id = v.id
                    AND b.status IN ('PENDING', 'CONFIRMED')
                    AND b.start_date <= $3
                    AND b.end_date >= $2
              )
            ORDER BY v.id
            "
        ))
        .bind(location)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("search available vehicles"))?;

        rows.iter().map(vehicle_from_row).collect()
    }

    async fn insert(&self, details: VehicleDetails) -> Result<Vehicle> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO vehicles (
                make, model, year, location, daily_rate, vehicle_type,
                license_plate, color, fuel_type, transmission, seats, image_url
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            ",
        )
        .bind(&details.make)
        .bind(&details.model)
        .bind(details.year)
        .bind(&details.location)
        .bind(details.daily_rate.amount())
        .bind(&details.vehicle_type)
        .bind(&details.license_plate)
        .bind(&details.color)
        .bind(&details.fuel_type)
        .bind(&details.transmission)
        .bind(details.seats)
        .bind(&details.image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("insert vehicle"))?;

        tracing::debug!(vehicle_id = id, "Vehicle inserted");
        Ok(Vehicle {
            id: VehicleId::new(id),
            details,
        })
    }

    async fn update(&self, vehicle: &Vehicle) -> Result<()> {
        let details = &vehicle.details;
        let result = sqlx::query(
            r"
            UPDATE vehicles
            SET make = $2, model = $3, year = $4, location = $5, daily_rate = $6,
                vehicle_type = $7, license_plate = $8, color = $9, fuel_type = $10,
                transmission = $11, seats = $12, image_url = $13
            WHERE id = $1
            ",
        )
        .bind(vehicle.id.value())
        .bind(&details.make)
        .bind(&details.model)
        .bind(details.year)
        .bind(&details.location)
        .bind(details.daily_rate.amount())
        .bind(&details.vehicle_type)
        .bind(&details.license_plate)
        .bind(&details.color)
        .bind(&details.fuel_type)
        .bind(&details.transmission)
        .bind(details.seats)
        .bind(&details.image_url)
        .execute(&self.pool)
        .await
        .map_err(storage("update vehicle"))?;

        require_row(result.rows_affected(), "vehicle", vehicle.id.value())
    }

    async fn delete_by_id(&self, id: VehicleId) -> Result<()> {
        sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(storage("delete vehicle"))?;
        Ok(())
    }
}
