use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::supplier_ids;

/// Lifecycle of a quote request. Stored as TEXT; transitions are guarded by
/// [`QuoteRequestStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteRequestStatus {
    Draft,
    Sent,
    /// A reply arrived but carried no structured pricing.
    Received,
    UnderReview,
    Approved,
    ConvertedToOrder,
    Cancelled,
}

impl QuoteRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteRequestStatus::Draft => "DRAFT",
            QuoteRequestStatus::Sent => "SENT",
            QuoteRequestStatus::Received => "RECEIVED",
            QuoteRequestStatus::UnderReview => "UNDER_REVIEW",
            QuoteRequestStatus::Approved => "APPROVED",
            QuoteRequestStatus::ConvertedToOrder => "CONVERTED_TO_ORDER",
            QuoteRequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(QuoteRequestStatus::Draft),
            "SENT" => Some(QuoteRequestStatus::Sent),
            "RECEIVED" => Some(QuoteRequestStatus::Received),
            "UNDER_REVIEW" => Some(QuoteRequestStatus::UnderReview),
            "APPROVED" => Some(QuoteRequestStatus::Approved),
            "CONVERTED_TO_ORDER" => Some(QuoteRequestStatus::ConvertedToOrder),
            "CANCELLED" => Some(QuoteRequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuoteRequestStatus::ConvertedToOrder | QuoteRequestStatus::Cancelled
        )
    }

    /// Transitions are monotonic except that UNDER_REVIEW can be re-entered
    /// (revision flow) and CANCELLED is reachable from any non-terminal state.
    pub fn can_transition_to(&self, next: QuoteRequestStatus) -> bool {
        use QuoteRequestStatus::*;
        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }
        match (self, next) {
            (Draft, Sent) => true,
            (Sent, Received) | (Sent, UnderReview) => true,
            (Received, UnderReview) | (Received, Approved) => true,
            (UnderReview, UnderReview) | (UnderReview, Approved) => true,
            (Approved, UnderReview) | (Approved, ConvertedToOrder) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemAvailability {
    InStock,
    Backorder,
    SpecialOrder,
    Unavailable,
    Unknown,
}

impl ItemAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemAvailability::InStock => "IN_STOCK",
            ItemAvailability::Backorder => "BACKORDER",
            ItemAvailability::SpecialOrder => "SPECIAL_ORDER",
            ItemAvailability::Unavailable => "UNAVAILABLE",
            ItemAvailability::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "IN_STOCK" => ItemAvailability::InStock,
            "BACKORDER" => ItemAvailability::Backorder,
            "SPECIAL_ORDER" => ItemAvailability::SpecialOrder,
            "UNAVAILABLE" => ItemAvailability::Unavailable,
            _ => ItemAvailability::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub quote_number: String,
    pub title: String,
    pub status: String,
    pub supplier_id: Option<Uuid>,
    pub additional_supplier_ids: Option<String>,
    pub selected_supplier_id: Option<Uuid>,
    pub total_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteRequest {
    pub fn status(&self) -> QuoteRequestStatus {
        QuoteRequestStatus::parse(&self.status).unwrap_or(QuoteRequestStatus::Draft)
    }

    pub fn additional_suppliers(&self) -> Vec<Uuid> {
        supplier_ids::decode(self.additional_supplier_ids.as_deref())
    }

    /// Primary supplier first, then additional suppliers, de-duplicated.
    pub fn supplier_set(&self) -> Vec<Uuid> {
        let mut out = Vec::new();
        if let Some(primary) = self.supplier_id {
            out.push(primary);
        }
        for id in self.additional_suppliers() {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteRequestItem {
    pub id: Uuid,
    pub quote_request_id: Uuid,
    /// Supplier that priced this line; used for multi-supplier comparison.
    pub supplier_id: Option<Uuid>,
    pub part_number: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub availability: String,
    pub lead_time_days: Option<i32>,
    pub is_alternative: bool,
    pub superseded_by: Option<String>,
    pub supersedes: Option<String>,
    pub supersession_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuoteItemRequest {
    #[validate(length(min = 1, max = 100, message = "Part number required"))]
    pub part_number: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuoteRequestRequest {
    #[validate(length(min = 1, max = 255, message = "Title required"))]
    pub title: String,
    pub vehicle_id: Option<Uuid>,
    pub supplier_id: Uuid,
    #[serde(default)]
    pub additional_supplier_ids: Vec<Uuid>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "At least one item required"), nested)]
    pub items: Vec<CreateQuoteItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct QuoteRequestResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub quote_number: String,
    pub title: String,
    pub status: String,
    pub supplier_id: Option<Uuid>,
    pub additional_supplier_ids: Vec<Uuid>,
    pub selected_supplier_id: Option<Uuid>,
    pub total_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<QuoteRequestItem>>,
}

impl From<QuoteRequest> for QuoteRequestResponse {
    fn from(qr: QuoteRequest) -> Self {
        let additional = qr.additional_suppliers();
        Self {
            id: qr.id,
            organization_id: qr.organization_id,
            vehicle_id: qr.vehicle_id,
            quote_number: qr.quote_number,
            title: qr.title,
            status: qr.status,
            supplier_id: qr.supplier_id,
            additional_supplier_ids: additional,
            selected_supplier_id: qr.selected_supplier_id,
            total_amount: qr.total_amount,
            notes: qr.notes,
            expiry_date: qr.expiry_date,
            created_at: qr.created_at,
            updated_at: qr.updated_at,
            items: None,
        }
    }
}

/// One supplier's column in the price comparison view.
#[derive(Debug, Serialize)]
pub struct SupplierComparison {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub link_status: Option<String>,
    pub response_date: Option<DateTime<Utc>>,
    pub items: Vec<QuoteRequestItem>,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PriceComparisonResponse {
    pub quote_request_id: Uuid,
    pub quote_number: String,
    pub suppliers: Vec<SupplierComparison>,
}

#[cfg(test)]
mod tests {
    use super::QuoteRequestStatus::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(Draft.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Received));
        assert!(Sent.can_transition_to(UnderReview));
        assert!(Received.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Approved));
        assert!(Approved.can_transition_to(ConvertedToOrder));
    }

    #[test]
    fn under_review_is_re_entrant() {
        assert!(UnderReview.can_transition_to(UnderReview));
        assert!(Approved.can_transition_to(UnderReview));
    }

    #[test]
    fn cancel_reachable_from_any_non_terminal_state() {
        for state in [Draft, Sent, Received, UnderReview, Approved] {
            assert!(state.can_transition_to(Cancelled));
        }
        assert!(!ConvertedToOrder.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for next in [Draft, Sent, Received, UnderReview, Approved, ConvertedToOrder] {
            assert!(!ConvertedToOrder.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn no_skipping_forward() {
        assert!(!Draft.can_transition_to(Approved));
        assert!(!Draft.can_transition_to(ConvertedToOrder));
        assert!(!Sent.can_transition_to(ConvertedToOrder));
        assert!(!Received.can_transition_to(ConvertedToOrder));
    }
}
