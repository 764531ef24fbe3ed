use sqlx::{query_as, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::maintenance::{CreateMaintenanceRequest, MaintenanceRecord};

pub struct MaintenanceRepository {
    pool: PgPool,
}

impl MaintenanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        organization_id: Uuid,
        created_by: Uuid,
        request: &CreateMaintenanceRequest,
    ) -> Result<MaintenanceRecord> {
        let record = query_as::<_, MaintenanceRecord>(
            r#"
            INSERT INTO maintenance_records
                (organization_id, vehicle_id, title, description, performed_at, odometer_km, cost, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(request.vehicle_id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.performed_at)
        .bind(request.odometer_km)
        .bind(request.cost)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn list_for_vehicle(
        &self,
        organization_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Vec<MaintenanceRecord>> {
        let records = query_as::<_, MaintenanceRecord>(
            r#"
            SELECT * FROM maintenance_records
            WHERE organization_id = $1 AND vehicle_id = $2
            ORDER BY performed_at DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(organization_id)
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
