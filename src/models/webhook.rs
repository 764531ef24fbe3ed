use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::email_thread::EmailAttachment;

/// One extracted line item from a parsed supplier reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedQuoteItem {
    pub part_number: String,
    pub description: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub availability: Option<String>,
    pub lead_time_days: Option<i32>,
    #[serde(default)]
    pub is_alternative: bool,
    pub superseded_by: Option<String>,
    pub supersedes: Option<String>,
    pub supersession_notes: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

/// Structured data the gateway's parse step extracted from a reply body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedQuoteData {
    #[serde(default)]
    pub quote_items: Vec<ExtractedQuoteItem>,
    pub total_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub additional_notes: Option<String>,
}

/// Inbound parse-webhook payload, correlated by the provider thread id.
#[derive(Debug, Deserialize, Validate)]
pub struct InboundEmailPayload {
    pub organization_id: Uuid,
    #[validate(length(min = 1, message = "Thread id required"))]
    pub external_thread_id: String,
    #[validate(email(message = "Invalid sender address"))]
    pub from_address: String,
    pub to_address: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub body_html: Option<String>,
    pub external_message_id: Option<String>,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extracted_data: ExtractedQuoteData,
    pub confidence: Option<f64>,
}

/// A reply carries structured pricing when the parse produced line items,
/// a non-zero total, or a high-confidence score.
pub fn has_structured_pricing(data: &ExtractedQuoteData, confidence: Option<f64>) -> bool {
    if !data.quote_items.is_empty() {
        return true;
    }
    if data.total_amount.map(|t| t > Decimal::ZERO).unwrap_or(false) {
        return true;
    }
    confidence.map(|c| c >= 0.7).unwrap_or(false)
}

impl InboundEmailPayload {
    pub fn has_structured_pricing(&self) -> bool {
        has_structured_pricing(&self.extracted_data, self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn payload() -> InboundEmailPayload {
        InboundEmailPayload {
            organization_id: Uuid::new_v4(),
            external_thread_id: "thr_1".to_string(),
            from_address: "sales@acme.com".to_string(),
            to_address: "buyer@fleet.example".to_string(),
            subject: None,
            body: None,
            body_html: None,
            external_message_id: None,
            attachments: Vec::new(),
            received_at: None,
            extracted_data: ExtractedQuoteData::default(),
            confidence: None,
        }
    }

    #[test]
    fn bare_acknowledgment_has_no_pricing() {
        assert!(!payload().has_structured_pricing());
    }

    #[test]
    fn items_imply_pricing() {
        let mut p = payload();
        p.extracted_data.quote_items.push(ExtractedQuoteItem {
            part_number: "BP-1044".to_string(),
            description: None,
            quantity: 1,
            unit_price: Some(Decimal::new(4500, 2)),
            availability: None,
            lead_time_days: None,
            is_alternative: false,
            superseded_by: None,
            supersedes: None,
            supersession_notes: None,
        });
        assert!(p.has_structured_pricing());
    }

    #[test]
    fn nonzero_total_implies_pricing_but_zero_does_not() {
        let mut p = payload();
        p.extracted_data.total_amount = Some(Decimal::ZERO);
        assert!(!p.has_structured_pricing());
        p.extracted_data.total_amount = Some(Decimal::new(45000, 2));
        assert!(p.has_structured_pricing());
    }

    #[test]
    fn confidence_threshold_is_inclusive() {
        let mut p = payload();
        p.confidence = Some(0.69);
        assert!(!p.has_structured_pricing());
        p.confidence = Some(0.7);
        assert!(p.has_structured_pricing());
    }
}
