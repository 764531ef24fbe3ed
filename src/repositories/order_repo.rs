use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{query, query_as, query_scalar, PgConnection, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::order::{FulfillmentMethod, Order, OrderItem, OrderStatus};

pub struct NewOrderItem<'a> {
    pub part_id: Uuid,
    pub part_number: &'a str,
    pub description: Option<&'a str>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub fulfillment_method: FulfillmentMethod,
    pub availability: &'a str,
    pub expected_delivery: Option<NaiveDate>,
}

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count_for_organization(&self, organization_id: Uuid) -> Result<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM orders WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_tx(
        conn: &mut PgConnection,
        organization_id: Uuid,
        order_number: &str,
        supplier_id: Uuid,
        quote_request_id: Uuid,
        fulfillment_method: FulfillmentMethod,
        subtotal: Decimal,
        tax: Decimal,
        shipping: Decimal,
        total: Decimal,
        notes: Option<&str>,
        created_by: Uuid,
    ) -> Result<Order> {
        let order = query_as::<_, Order>(
            r#"
            INSERT INTO orders
                (organization_id, order_number, status, supplier_id, quote_request_id,
                 fulfillment_method, subtotal, tax, shipping, total, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(order_number)
        .bind(OrderStatus::PendingConfirmation.as_str())
        .bind(supplier_id)
        .bind(quote_request_id)
        .bind(fulfillment_method.as_str())
        .bind(subtotal)
        .bind(tax)
        .bind(shipping)
        .bind(total)
        .bind(notes)
        .bind(created_by)
        .fetch_one(conn)
        .await?;
        Ok(order)
    }

    pub async fn insert_item_tx(
        conn: &mut PgConnection,
        order_id: Uuid,
        item: NewOrderItem<'_>,
    ) -> Result<OrderItem> {
        let inserted = query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items
                (order_id, part_id, part_number, description, quantity, unit_price,
                 fulfillment_method, availability, expected_delivery)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(item.part_id)
        .bind(item.part_number)
        .bind(item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.fulfillment_method.as_str())
        .bind(item.availability)
        .bind(item.expected_delivery)
        .fetch_one(conn)
        .await?;
        Ok(inserted)
    }

    pub async fn find_by_id(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Order>> {
        let order =
            query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND organization_id = $2")
                .bind(id)
                .bind(organization_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(order)
    }

    /// A retried conversion reuses the pending order for this quote/supplier
    /// pair instead of creating a second one.
    pub async fn find_pending_for_quote(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Order>> {
        let order = query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE organization_id = $1 AND quote_request_id = $2 AND supplier_id = $3
              AND status = $4
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(organization_id)
        .bind(quote_request_id)
        .bind(supplier_id)
        .bind(OrderStatus::PendingConfirmation.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Order>> {
        let limit = limit.unwrap_or(50).min(100);
        let offset = offset.unwrap_or(0);

        let orders = query_as::<_, Order>(
            "SELECT * FROM orders WHERE organization_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        let items = query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn update_status_tx(
        conn: &mut PgConnection,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<()> {
        query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }
}
