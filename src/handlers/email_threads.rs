use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    middleware::{
        error_handling::{AppError, Result},
        Claims,
    },
    models::email_thread::EmailThreadResponse,
    repositories::{
        store::{PgStore, ProcurementStore},
        EmailThreadRepository,
    },
    services::{
        self, AssignOutcome, QuoteLifecycleService, ReconcileOutcome,
        ThreadReconciliationService,
    },
};

fn store(config: &AppConfig) -> Arc<dyn ProcurementStore> {
    Arc::new(PgStore::new(config.database_pool.clone()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub quote_request_id: Uuid,
    /// Optional override when the supplier cannot be inferred from the thread.
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub target_thread_id: Uuid,
}

pub async fn list_threads(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<EmailThreadResponse>>> {
    let repo = EmailThreadRepository::new(config.database_pool.clone());
    let threads = repo
        .list(claims.organization_id, query.limit, query.offset)
        .await?;
    Ok(Json(threads.into_iter().map(Into::into).collect()))
}

/// Threads no webhook or sync pass has managed to attach to a quote request.
pub async fn list_orphaned(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<EmailThreadResponse>>> {
    let repo = EmailThreadRepository::new(config.database_pool.clone());
    let threads = repo.list_orphaned(claims.organization_id).await?;
    Ok(Json(threads.into_iter().map(Into::into).collect()))
}

pub async fn get_thread(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<EmailThreadResponse>> {
    let repo = EmailThreadRepository::new(config.database_pool.clone());
    let thread = repo
        .find_by_id(claims.organization_id, id)
        .await?
        .ok_or(AppError::NotFound("Email thread not found".to_string()))?;

    let messages = repo.messages(thread.id).await?;
    let mut response: EmailThreadResponse = thread.into();
    response.messages = Some(messages);
    Ok(Json(response))
}

pub async fn assign_orphan(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<AssignOutcome>> {
    let service = ThreadReconciliationService::new(store(&config));
    let outcome = service
        .assign_orphan(
            claims.organization_id,
            claims.user_id,
            id,
            request.quote_request_id,
            request.supplier_id,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn merge_threads(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<MergeRequest>,
) -> Result<Json<EmailThreadResponse>> {
    let service = ThreadReconciliationService::new(store(&config));
    let target = service
        .merge(
            claims.organization_id,
            claims.user_id,
            id,
            request.target_thread_id,
        )
        .await?;
    Ok(Json(target.into()))
}

/// Re-runs extraction over the thread's latest inbound message, for replies
/// the original webhook parse got wrong.
pub async fn reparse_thread(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReconcileOutcome>> {
    let gateway: Arc<dyn services::EmailGateway> =
        Arc::new(services::HttpEmailGateway::new(&config.gateway)?);
    let service = QuoteLifecycleService::new(store(&config), gateway);
    let outcome = service.reparse_thread(claims.organization_id, id).await?;
    Ok(Json(outcome))
}
