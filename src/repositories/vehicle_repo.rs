use sqlx::{query, query_as, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::vehicle::{CreateVehicleRequest, UpdateVehicleRequest, Vehicle};

pub struct VehicleRepository {
    pool: PgPool,
}

impl VehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        organization_id: Uuid,
        request: &CreateVehicleRequest,
    ) -> Result<Vehicle> {
        let vehicle = query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (organization_id, registration, vin, make, model, year, odometer_km, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(&request.registration)
        .bind(&request.vin)
        .bind(&request.make)
        .bind(&request.model)
        .bind(request.year)
        .bind(request.odometer_km)
        .bind(&request.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(vehicle)
    }

    pub async fn find_by_id(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Vehicle>> {
        let vehicle = query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vehicle)
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Vehicle>> {
        let limit = limit.unwrap_or(50).min(100);
        let offset = offset.unwrap_or(0);

        let vehicles = query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE organization_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(vehicles)
    }

    pub async fn update(
        &self,
        organization_id: Uuid,
        id: Uuid,
        request: &UpdateVehicleRequest,
    ) -> Result<Option<Vehicle>> {
        let vehicle = query_as::<_, Vehicle>(
            r#"
            UPDATE vehicles
            SET vin = COALESCE($3, vin),
                odometer_km = COALESCE($4, odometer_km),
                notes = COALESCE($5, notes),
                updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&request.vin)
        .bind(request.odometer_km)
        .bind(&request.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vehicle)
    }

    pub async fn delete(&self, organization_id: Uuid, id: Uuid) -> Result<bool> {
        let result = query("DELETE FROM vehicles WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
