use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub registration: String,
    pub vin: Option<String>,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub odometer_km: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 1, max = 50, message = "Registration required"))]
    pub registration: String,
    #[validate(length(max = 50, message = "VIN too long"))]
    pub vin: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Make required"))]
    pub make: String,
    #[validate(length(min = 1, max = 100, message = "Model required"))]
    pub model: String,
    #[validate(range(min = 1900, max = 2100, message = "Invalid year"))]
    pub year: Option<i32>,
    pub odometer_km: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(length(max = 50, message = "VIN too long"))]
    pub vin: Option<String>,
    pub odometer_km: Option<i32>,
    pub notes: Option<String>,
}
