use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order rows exist but the confirmation email has not gone out yet.
    /// A retried conversion picks these up instead of creating a second order.
    PendingConfirmation,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "PENDING_CONFIRMATION",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_CONFIRMATION" => Some(OrderStatus::PendingConfirmation),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentMethod {
    Delivery,
    Pickup,
    Split,
}

impl FulfillmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Delivery => "DELIVERY",
            FulfillmentMethod::Pickup => "PICKUP",
            FulfillmentMethod::Split => "SPLIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DELIVERY" => Some(FulfillmentMethod::Delivery),
            "PICKUP" => Some(FulfillmentMethod::Pickup),
            "SPLIT" => Some(FulfillmentMethod::Split),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub supplier_id: Option<Uuid>,
    pub quote_request_id: Option<Uuid>,
    pub fulfillment_method: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::parse(&self.status).unwrap_or(OrderStatus::PendingConfirmation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub part_id: Uuid,
    pub part_number: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub fulfillment_method: String,
    pub availability: String,
    pub expected_delivery: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConvertToOrderRequest {
    pub fulfillment_method: FulfillmentMethod,
    /// Defaults to the quote request's primary supplier.
    pub selected_supplier_id: Option<Uuid>,
    pub tax: Option<Decimal>,
    pub shipping: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub supplier_id: Option<Uuid>,
    pub quote_request_id: Option<Uuid>,
    pub fulfillment_method: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItem>>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            organization_id: order.organization_id,
            order_number: order.order_number,
            status: order.status,
            supplier_id: order.supplier_id,
            quote_request_id: order.quote_request_id,
            fulfillment_method: order.fulfillment_method,
            subtotal: order.subtotal,
            tax: order.tax,
            shipping: order.shipping,
            total: order.total,
            notes: order.notes,
            created_at: order.created_at,
            items: None,
        }
    }
}
