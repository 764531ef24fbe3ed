use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{
        error_handling::{AppError, Result},
        Claims,
    },
    models::{
        activity::ActivityLog,
        order::{ConvertToOrderRequest, OrderResponse},
        quote_request::{
            CreateQuoteRequestRequest, PriceComparisonResponse, QuoteRequestResponse,
            SupplierComparison,
        },
    },
    repositories::{
        store::{PgStore, ProcurementStore},
        EmailThreadRepository, QuoteRequestRepository, SupplierRepository,
    },
    services::{
        self, numbering, ConversionService, QuoteLifecycleService, SendSummary,
        SupplierReplyStatus, SyncSummary, ThreadReconciliationService, ThreadStatusPromotion,
    },
};

fn store(config: &AppConfig) -> Arc<dyn ProcurementStore> {
    Arc::new(PgStore::new(config.database_pool.clone()))
}

fn gateway(config: &AppConfig) -> Result<Arc<dyn services::EmailGateway>> {
    Ok(Arc::new(services::HttpEmailGateway::new(&config.gateway)?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    #[serde(default)]
    pub force: bool,
}

/// Creates a draft quote request with its item lines. The quote number is
/// allocated from the organization's running count; a collision under
/// concurrency is retried once with the next sequence value.
pub async fn create_quote_request(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateQuoteRequestRequest>,
) -> Result<(StatusCode, Json<QuoteRequestResponse>)> {
    request.validate().map_err(AppError::Validation)?;

    let supplier_repo = SupplierRepository::new(config.database_pool.clone());
    supplier_repo
        .find_by_id(claims.organization_id, request.supplier_id)
        .await?
        .ok_or(AppError::NotFound("Supplier not found".to_string()))?;

    let repo = QuoteRequestRepository::new(config.database_pool.clone());
    let today = Utc::now().date_naive();
    let mut sequence = repo.count_for_organization(claims.organization_id).await? + 1;

    for attempt in 0..2 {
        let quote_number = numbering::format_quote_number(today, sequence);
        let created = repo
            .create(
                claims.organization_id,
                claims.user_id,
                &quote_number,
                &request.title,
                request.vehicle_id,
                request.supplier_id,
                &request.additional_supplier_ids,
                request.expiry_date,
                request.notes.as_deref(),
                &request.items,
            )
            .await;

        match created {
            Ok(quote) => {
                let items = repo.items(quote.id).await?;
                let mut response: QuoteRequestResponse = quote.into();
                response.items = Some(items);
                return Ok((StatusCode::CREATED, Json(response)));
            }
            Err(AppError::Conflict(_)) if attempt == 0 => {
                sequence += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::Conflict("Could not allocate quote number".to_string()))
}

pub async fn list_quote_requests(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<QuoteRequestResponse>>> {
    let repo = QuoteRequestRepository::new(config.database_pool.clone());
    let requests = repo
        .list(claims.organization_id, query.limit, query.offset)
        .await?;
    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

pub async fn get_quote_request(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuoteRequestResponse>> {
    let repo = QuoteRequestRepository::new(config.database_pool.clone());
    let quote = repo
        .find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Quote request not found".to_string()))?;

    let items = repo.items(quote.id).await?;
    let mut response: QuoteRequestResponse = quote.into();
    response.items = Some(items);
    Ok(Json(response))
}

/// Fans the request out to every listed supplier. Returns the dispatch
/// summary immediately; reply status is polled separately.
pub async fn send_quote_request(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SendSummary>> {
    let service = QuoteLifecycleService::new(store(&config), gateway(&config)?);
    let summary = service.send(claims.organization_id, claims.user_id, id).await?;
    Ok(Json(summary))
}

pub async fn reply_status(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SupplierReplyStatus>>> {
    let service = QuoteLifecycleService::without_gateway(store(&config));
    let statuses = service.reply_status(claims.organization_id, id).await?;
    Ok(Json(statuses))
}

pub async fn refresh_thread_statuses(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ThreadStatusPromotion>> {
    let service = QuoteLifecycleService::without_gateway(store(&config));
    let promotion = service.update_thread_statuses(claims.organization_id, id).await?;
    Ok(Json(promotion))
}

pub async fn approve_quote_request(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuoteRequestResponse>> {
    let service = QuoteLifecycleService::without_gateway(store(&config));
    let quote = service.approve(claims.organization_id, claims.user_id, id).await?;
    Ok(Json(quote.into()))
}

pub async fn cancel_quote_request(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuoteRequestResponse>> {
    let service = QuoteLifecycleService::without_gateway(store(&config));
    let quote = service.cancel(claims.organization_id, claims.user_id, id).await?;
    Ok(Json(quote.into()))
}

pub async fn reopen_quote_request(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuoteRequestResponse>> {
    let service = QuoteLifecycleService::without_gateway(store(&config));
    let quote = service
        .reopen_review(claims.organization_id, claims.user_id, id)
        .await?;
    Ok(Json(quote.into()))
}

/// Groups quoted lines per supplier so responses can be compared
/// side by side. Suppliers that have not priced anything yet appear
/// with an empty column.
pub async fn price_comparison(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<PriceComparisonResponse>> {
    let repo = QuoteRequestRepository::new(config.database_pool.clone());
    let thread_repo = EmailThreadRepository::new(config.database_pool.clone());
    let supplier_repo = SupplierRepository::new(config.database_pool.clone());

    let quote = repo
        .find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Quote request not found".to_string()))?;

    let items = repo.items(id).await?;
    let links = thread_repo.links_for_request(id).await?;
    let suppliers = supplier_repo
        .find_many_by_ids(claims.organization_id, &quote.supplier_set())
        .await?;

    let mut columns = Vec::with_capacity(suppliers.len());
    for supplier_id in quote.supplier_set() {
        let Some(supplier) = suppliers.iter().find(|s| s.id == supplier_id) else {
            continue;
        };
        let link = links.iter().find(|l| l.supplier_id == supplier_id);
        let supplier_items: Vec<_> = items
            .iter()
            .filter(|i| i.supplier_id == Some(supplier_id))
            .cloned()
            .collect();
        let total = supplier_items
            .iter()
            .map(|i| i.unit_price.unwrap_or(Decimal::ZERO) * Decimal::from(i.quantity))
            .sum();

        columns.push(SupplierComparison {
            supplier_id,
            supplier_name: supplier.name.clone(),
            link_status: link.map(|l| l.status.clone()),
            response_date: link.and_then(|l| l.response_date),
            items: supplier_items,
            total,
        });
    }

    Ok(Json(PriceComparisonResponse {
        quote_request_id: quote.id,
        quote_number: quote.quote_number,
        suppliers: columns,
    }))
}

pub async fn convert_to_order(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<ConvertToOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    request.validate().map_err(AppError::Validation)?;

    let service = ConversionService::new(store(&config), gateway(&config)?);
    let order = service
        .convert(claims.organization_id, claims.user_id, id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn sync_threads(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<SyncSummary>> {
    let service = ThreadReconciliationService::new(store(&config));
    let summary = service
        .sync_threads(claims.organization_id, id, query.force)
        .await?;
    Ok(Json(summary))
}

pub async fn activity_feed(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ActivityLog>>> {
    let repo = QuoteRequestRepository::new(config.database_pool.clone());
    repo.find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Quote request not found".to_string()))?;

    let activity = services::ActivityLogService::new(config.database_pool.clone());
    let entries = activity
        .list_for_entity(claims.organization_id, "quote_request", id)
        .await?;
    Ok(Json(entries))
}
