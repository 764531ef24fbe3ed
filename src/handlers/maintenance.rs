use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{
        error_handling::{AppError, Result},
        Claims,
    },
    models::maintenance::{CreateMaintenanceRequest, MaintenanceRecord},
    repositories::{MaintenanceRepository, VehicleRepository},
};

pub async fn create_record(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateMaintenanceRequest>,
) -> Result<(StatusCode, Json<MaintenanceRecord>)> {
    request.validate().map_err(AppError::Validation)?;

    let vehicle_repo = VehicleRepository::new(config.database_pool.clone());
    vehicle_repo
        .find_by_id(claims.organization_id, request.vehicle_id)
        .await?
        .ok_or(AppError::NotFound("Vehicle not found".to_string()))?;

    let repo = MaintenanceRepository::new(config.database_pool.clone());
    let record = repo
        .create(claims.organization_id, claims.user_id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_for_vehicle(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(vehicle_id): Path<Uuid>,
) -> Result<Json<Vec<MaintenanceRecord>>> {
    let vehicle_repo = VehicleRepository::new(config.database_pool.clone());
    vehicle_repo
        .find_by_id(claims.organization_id, vehicle_id)
        .await?
        .ok_or(AppError::NotFound("Vehicle not found".to_string()))?;

    let repo = MaintenanceRepository::new(config.database_pool.clone());
    let records = repo
        .list_for_vehicle(claims.organization_id, vehicle_id)
        .await?;
    Ok(Json(records))
}
