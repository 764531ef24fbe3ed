use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::error_handling::{AppError, Result},
    models::webhook::InboundEmailPayload,
    repositories::store::PgStore,
    services::{QuoteLifecycleService, ReconcileOutcome},
};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Verifies `X-Webhook-Signature: sha256=<hex>` over the raw body.
fn verify_signature(secret: &str, payload: &[u8], headers: &HeaderMap) -> Result<()> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized("Missing webhook signature".to_string()))?;

    let signature_hex = header.strip_prefix("sha256=").ok_or(AppError::BadRequest(
        "Invalid signature format. Expected: sha256=<hex>".to_string(),
    ))?;

    let expected = hex::decode(signature_hex)
        .map_err(|_| AppError::BadRequest("Invalid signature encoding".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {:?}", e)))?;
    mac.update(payload);

    // Constant-time comparison
    if mac.verify_slice(&expected).is_err() {
        return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<BatchItemOutcome>,
}

#[derive(Debug, Serialize)]
pub struct BatchItemOutcome {
    pub external_thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconcileOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Reconciliation only reads and writes the store; replies never call back
// out through the gateway.
fn lifecycle(config: &AppConfig) -> QuoteLifecycleService {
    QuoteLifecycleService::without_gateway(Arc::new(PgStore::new(config.database_pool.clone())))
}

/// Inbound parsed-reply callback from the email gateway. The body must be
/// verified against the shared secret before it is deserialized.
pub async fn inbound_email(
    State(config): State<AppConfig>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReconcileOutcome>> {
    verify_signature(&config.gateway.webhook_secret, &body, &headers)?;

    let payload: InboundEmailPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid payload: {e}")))?;
    payload.validate().map_err(AppError::Validation)?;

    let service = lifecycle(&config);
    let outcome = service
        .reconcile_inbound_reply(payload.organization_id, &payload)
        .await?;
    Ok(Json(outcome))
}

/// Batch variant used when the gateway flushes a backlog. Always responds
/// 200 with a per-item summary; one bad reply never blocks the rest.
pub async fn inbound_email_batch(
    State(config): State<AppConfig>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BatchOutcome>> {
    verify_signature(&config.gateway.webhook_secret, &body, &headers)?;

    let payloads: Vec<InboundEmailPayload> = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid payload: {e}")))?;

    let service = lifecycle(&config);
    let mut results = Vec::with_capacity(payloads.len());
    let mut failed = 0;

    for payload in &payloads {
        if let Err(e) = payload.validate() {
            failed += 1;
            results.push(BatchItemOutcome {
                external_thread_id: payload.external_thread_id.clone(),
                outcome: None,
                error: Some(e.to_string()),
            });
            continue;
        }
        match service
            .reconcile_inbound_reply(payload.organization_id, payload)
            .await
        {
            Ok(outcome) => results.push(BatchItemOutcome {
                external_thread_id: payload.external_thread_id.clone(),
                outcome: Some(outcome),
                error: None,
            }),
            Err(e) => {
                tracing::warn!(
                    "Webhook batch item {} failed: {}",
                    payload.external_thread_id,
                    e
                );
                failed += 1;
                results.push(BatchItemOutcome {
                    external_thread_id: payload.external_thread_id.clone(),
                    outcome: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    Ok(Json(BatchOutcome {
        processed: results.len() - failed,
        failed,
        results,
    }))
}
