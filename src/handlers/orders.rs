use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    middleware::{
        error_handling::{AppError, Result},
        Claims,
    },
    models::order::OrderResponse,
    repositories::OrderRepository,
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_orders(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderResponse>>> {
    let repo = OrderRepository::new(config.database_pool.clone());
    let orders = repo
        .list(claims.organization_id, query.limit, query.offset)
        .await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

pub async fn get_order(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>> {
    let repo = OrderRepository::new(config.database_pool.clone());
    let order = repo
        .find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Order not found".to_string()))?;

    let items = repo.items(order.id).await?;
    let mut response: OrderResponse = order.into();
    response.items = Some(items);
    Ok(Json(response))
}
