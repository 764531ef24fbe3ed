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
    models::part::{CreatePartRequest, Part, UpdatePartRequest},
    repositories::PartRepository,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_part(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreatePartRequest>,
) -> Result<(StatusCode, Json<Part>)> {
    request.validate().map_err(AppError::Validation)?;

    let repo = PartRepository::new(config.database_pool.clone());
    let part = repo.create(claims.organization_id, &request).await?;
    Ok((StatusCode::CREATED, Json(part)))
}

pub async fn list_parts(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Part>>> {
    let repo = PartRepository::new(config.database_pool.clone());
    let parts = repo
        .list(claims.organization_id, query.limit, query.offset)
        .await?;
    Ok(Json(parts))
}

pub async fn get_part(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Part>> {
    let repo = PartRepository::new(config.database_pool.clone());
    let part = repo
        .find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Part not found".to_string()))?;
    Ok(Json(part))
}

pub async fn update_part(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePartRequest>,
) -> Result<Json<Part>> {
    request.validate().map_err(AppError::Validation)?;

    let repo = PartRepository::new(config.database_pool.clone());
    let part = repo
        .update(claims.organization_id, id, &request)
        .await?
        .ok_or(AppError::NotFound("Part not found".to_string()))?;
    Ok(Json(part))
}
