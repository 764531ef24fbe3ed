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
    models::supplier::{CreateSupplierRequest, Supplier, UpdateSupplierRequest},
    repositories::SupplierRepository,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn create_supplier(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<Supplier>)> {
    request.validate().map_err(AppError::Validation)?;

    let repo = SupplierRepository::new(config.database_pool.clone());
    let supplier = repo.create(claims.organization_id, &request).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn list_suppliers(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Supplier>>> {
    let repo = SupplierRepository::new(config.database_pool.clone());
    let suppliers = repo
        .list(claims.organization_id, query.limit, query.offset)
        .await?;
    Ok(Json(suppliers))
}

pub async fn get_supplier(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Supplier>> {
    let repo = SupplierRepository::new(config.database_pool.clone());
    let supplier = repo
        .find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Supplier not found".to_string()))?;
    Ok(Json(supplier))
}

pub async fn update_supplier(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSupplierRequest>,
) -> Result<Json<Supplier>> {
    request.validate().map_err(AppError::Validation)?;

    let repo = SupplierRepository::new(config.database_pool.clone());
    let supplier = repo
        .update(claims.organization_id, id, &request)
        .await?
        .ok_or(AppError::NotFound("Supplier not found".to_string()))?;
    Ok(Json(supplier))
}
