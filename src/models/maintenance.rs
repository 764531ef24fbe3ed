use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaintenanceRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub vehicle_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub performed_at: Option<NaiveDate>,
    pub odometer_km: Option<i32>,
    pub cost: Option<Decimal>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaintenanceRequest {
    pub vehicle_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Title required"))]
    pub title: String,
    pub description: Option<String>,
    pub performed_at: Option<NaiveDate>,
    pub odometer_km: Option<i32>,
    pub cost: Option<Decimal>,
}
