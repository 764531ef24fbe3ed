/// Client for the external email-generation gateway: it renders and delivers
/// RFQ and order-confirmation mail, and parses supplier replies into
/// structured pricing. Calls are authenticated with a short-lived signed
/// token and bounded by a generation timeout; non-response is a retryable
/// failure, never a hang.
use async_trait::async_trait;
use chrono::NaiveDate;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::GatewayConfig;
use crate::middleware::error_handling::{AppError, Result};
use crate::models::email_thread::EmailAttachment;
use crate::models::webhook::ExtractedQuoteData;

/// The generation call can take a while for long item lists; beyond this the
/// caller treats the gateway as unavailable and retries later.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(150);
const TOKEN_TTL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Serialize)]
pub struct SupplierContact {
    pub name: String,
    pub email: String,
    pub contact_person: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleContext {
    pub registration: String,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub vin: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteEmailLine {
    pub part_number: String,
    pub description: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteRequestEmailPayload {
    pub quote_number: String,
    pub title: String,
    pub supplier: SupplierContact,
    pub organization: OrganizationContact,
    pub vehicle: Option<VehicleContext>,
    pub items: Vec<QuoteEmailLine>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedQuoteEmail {
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
    pub message_id: String,
    /// Provider-side correlation id for the new conversation.
    pub external_thread_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderEmailLine {
    pub part_number: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmationPayload {
    pub order_number: String,
    pub quote_number: Option<String>,
    pub supplier: SupplierContact,
    pub organization: OrganizationContact,
    pub fulfillment_method: String,
    pub items: Vec<OrderEmailLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderConfirmationEmail {
    pub subject: String,
    pub body: String,
    pub body_html: Option<String>,
    pub message_id: String,
    pub purchase_order_attachment: Option<EmailAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseEmailPayload {
    pub subject: Option<String>,
    pub body: String,
    pub supplier_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseEmailResult {
    #[serde(default)]
    pub extracted_data: ExtractedQuoteData,
    pub confidence: Option<f64>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn generate_quote_request_email(
        &self,
        payload: &QuoteRequestEmailPayload,
    ) -> Result<GeneratedQuoteEmail>;

    async fn generate_order_confirmation_email(
        &self,
        payload: &OrderConfirmationPayload,
    ) -> Result<OrderConfirmationEmail>;

    async fn parse_email(&self, payload: &ParseEmailPayload) -> Result<ParseEmailResult>;
}

#[derive(Debug, Serialize, Deserialize)]
struct GatewayTokenClaims {
    iss: String,
    iat: u64,
    exp: u64,
}

/// Mints the 5-minute bearer token the gateway expects.
pub fn mint_gateway_token(secret: &str) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("clock error: {e}")))?
        .as_secs();

    let claims = GatewayTokenClaims {
        iss: "fleetdesk".to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

pub struct HttpEmailGateway {
    http_client: reqwest::Client,
    base_url: String,
    token_secret: String,
}

impl HttpEmailGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("http client init: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_secret: config.token_secret.clone(),
        })
    }

    async fn post_json<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        payload: &P,
    ) -> Result<R> {
        let token = mint_gateway_token(&self.token_secret)?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalGateway(format!("{path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalGateway(format!(
                "{path}: gateway returned {status}"
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| AppError::ExternalGateway(format!("{path}: invalid response: {e}")))
    }
}

#[async_trait]
impl EmailGateway for HttpEmailGateway {
    async fn generate_quote_request_email(
        &self,
        payload: &QuoteRequestEmailPayload,
    ) -> Result<GeneratedQuoteEmail> {
        self.post_json("/email/quote-request", payload).await
    }

    async fn generate_order_confirmation_email(
        &self,
        payload: &OrderConfirmationPayload,
    ) -> Result<OrderConfirmationEmail> {
        self.post_json("/email/order-confirmation", payload).await
    }

    async fn parse_email(&self, payload: &ParseEmailPayload) -> Result<ParseEmailResult> {
        self.post_json("/email/parse", payload).await
    }
}

/// Canned gateway for workflow tests: deterministic generated mail, optional
/// per-address failures, and a fixed parse result.
#[cfg(test)]
pub mod stubs {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct CannedGateway {
        /// Supplier addresses whose sends fail with a gateway error.
        pub fail_for: HashSet<String>,
        pub fail_confirmations: bool,
        pub parse_result: Mutex<Option<ParseEmailResult>>,
    }

    impl CannedGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_for(addresses: &[&str]) -> Self {
            Self {
                fail_for: addresses.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn failing_confirmations() -> Self {
            Self {
                fail_confirmations: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl EmailGateway for CannedGateway {
        async fn generate_quote_request_email(
            &self,
            payload: &QuoteRequestEmailPayload,
        ) -> Result<GeneratedQuoteEmail> {
            if self.fail_for.contains(&payload.supplier.email) {
                return Err(AppError::ExternalGateway("gateway returned 502".to_string()));
            }
            Ok(GeneratedQuoteEmail {
                subject: format!("Quote request {}", payload.quote_number),
                body: format!("Please quote {} line(s).", payload.items.len()),
                body_html: None,
                message_id: format!("<{}@mail.test>", uuid::Uuid::new_v4()),
                external_thread_id: Some(format!("ext-{}", uuid::Uuid::new_v4())),
            })
        }

        async fn generate_order_confirmation_email(
            &self,
            payload: &OrderConfirmationPayload,
        ) -> Result<OrderConfirmationEmail> {
            if self.fail_confirmations || self.fail_for.contains(&payload.supplier.email) {
                return Err(AppError::ExternalGateway("gateway returned 502".to_string()));
            }
            Ok(OrderConfirmationEmail {
                subject: format!("Order {}", payload.order_number),
                body: "Order confirmed.".to_string(),
                body_html: None,
                message_id: format!("<{}@mail.test>", uuid::Uuid::new_v4()),
                purchase_order_attachment: None,
            })
        }

        async fn parse_email(&self, _payload: &ParseEmailPayload) -> Result<ParseEmailResult> {
            let canned = self.parse_result.lock().unwrap().take();
            Ok(canned.unwrap_or(ParseEmailResult {
                extracted_data: ExtractedQuoteData::default(),
                confidence: Some(0.0),
                suggested_actions: Vec::new(),
            }))
        }
    }
}
