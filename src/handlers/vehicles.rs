use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{
        error_handling::{AppError, Result},
        Claims,
    },
    models::vehicle::{CreateVehicleRequest, UpdateVehicleRequest, Vehicle},
    repositories::VehicleRepository,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_vehicle(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>)> {
    request.validate().map_err(AppError::Validation)?;

    let repo = VehicleRepository::new(config.database_pool.clone());
    let vehicle = repo.create(claims.organization_id, &request).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn list_vehicles(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Vehicle>>> {
    let repo = VehicleRepository::new(config.database_pool.clone());
    let vehicles = repo
        .list(claims.organization_id, query.limit, query.offset)
        .await?;
    Ok(Json(vehicles))
}

pub async fn get_vehicle(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vehicle>> {
    let repo = VehicleRepository::new(config.database_pool.clone());
    let vehicle = repo
        .find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Vehicle not found".to_string()))?;
    Ok(Json(vehicle))
}

pub async fn update_vehicle(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateVehicleRequest>,
) -> Result<Json<Vehicle>> {
    request.validate().map_err(AppError::Validation)?;

    let repo = VehicleRepository::new(config.database_pool.clone());
    let vehicle = repo
        .update(claims.organization_id, id, &request)
        .await?
        .ok_or(AppError::NotFound("Vehicle not found".to_string()))?;
    Ok(Json(vehicle))
}

pub async fn delete_vehicle(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = VehicleRepository::new(config.database_pool.clone());
    let deleted = repo.delete(claims.organization_id, id).await?;
    if !deleted {
        return Err(AppError::NotFound("Vehicle not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
