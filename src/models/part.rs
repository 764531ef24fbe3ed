use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Reusable catalog entry. `part_number` is unique per organization;
/// conversion creates a Part lazily when a supplier quotes a number
/// that has never been recorded.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Part {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub part_number: String,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    pub superseded_by: Option<String>,
    pub supersedes: Option<String>,
    pub supersession_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePartRequest {
    #[validate(length(min = 1, max = 100, message = "Part number required"))]
    pub part_number: String,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    #[validate(length(max = 100, message = "Part number too long"))]
    pub superseded_by: Option<String>,
    #[validate(length(max = 100, message = "Part number too long"))]
    pub supersedes: Option<String>,
    pub supersession_notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePartRequest {
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    #[validate(length(max = 100, message = "Part number too long"))]
    pub superseded_by: Option<String>,
    #[validate(length(max = 100, message = "Part number too long"))]
    pub supersedes: Option<String>,
    pub supersession_notes: Option<String>,
}
