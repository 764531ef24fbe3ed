use rust_decimal::Decimal;
use sqlx::{query, query_as, query_scalar, PgConnection, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::quote_request::{
    CreateQuoteItemRequest, QuoteRequest, QuoteRequestItem, QuoteRequestStatus,
};
use crate::models::supplier_ids;
use crate::models::webhook::ExtractedQuoteItem;

pub struct QuoteRequestRepository {
    pool: PgPool,
}

impl QuoteRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count_for_organization(&self, organization_id: Uuid) -> Result<i64> {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM quote_requests WHERE organization_id = $1")
                .bind(organization_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Creates the draft request and its line items in one transaction.
    pub async fn create(
        &self,
        organization_id: Uuid,
        created_by: Uuid,
        quote_number: &str,
        title: &str,
        vehicle_id: Option<Uuid>,
        supplier_id: Uuid,
        additional_supplier_ids: &[Uuid],
        expiry_date: Option<chrono::NaiveDate>,
        notes: Option<&str>,
        items: &[CreateQuoteItemRequest],
    ) -> Result<QuoteRequest> {
        let mut tx = self.pool.begin().await?;

        let request = query_as::<_, QuoteRequest>(
            r#"
            INSERT INTO quote_requests
                (organization_id, vehicle_id, quote_number, title, status, supplier_id,
                 additional_supplier_ids, expiry_date, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(vehicle_id)
        .bind(quote_number)
        .bind(title)
        .bind(QuoteRequestStatus::Draft.as_str())
        .bind(supplier_id)
        .bind(supplier_ids::encode(additional_supplier_ids))
        .bind(expiry_date)
        .bind(notes)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        for item in items {
            query(
                r#"
                INSERT INTO quote_request_items
                    (quote_request_id, part_number, description, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(request.id)
            .bind(&item.part_number)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(request)
    }

    pub async fn find_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<QuoteRequest>> {
        let request = query_as::<_, QuoteRequest>(
            "SELECT * FROM quote_requests WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<QuoteRequest>> {
        let limit = limit.unwrap_or(50).min(100);
        let offset = offset.unwrap_or(0);

        let requests = query_as::<_, QuoteRequest>(
            "SELECT * FROM quote_requests WHERE organization_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    pub async fn items(&self, quote_request_id: Uuid) -> Result<Vec<QuoteRequestItem>> {
        let items = query_as::<_, QuoteRequestItem>(
            "SELECT * FROM quote_request_items WHERE quote_request_id = $1 ORDER BY created_at",
        )
        .bind(quote_request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Only the lines priced by the given supplier; conversion copies exactly
    /// these.
    pub async fn items_for_supplier(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Vec<QuoteRequestItem>> {
        let items = query_as::<_, QuoteRequestItem>(
            r#"
            SELECT * FROM quote_request_items
            WHERE quote_request_id = $1 AND supplier_id = $2 AND unit_price IS NOT NULL
            ORDER BY created_at
            "#,
        )
        .bind(quote_request_id)
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn update_status(&self, id: Uuid, status: QuoteRequestStatus) -> Result<()> {
        query("UPDATE quote_requests SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_status_tx(
        conn: &mut PgConnection,
        id: Uuid,
        status: QuoteRequestStatus,
    ) -> Result<()> {
        query("UPDATE quote_requests SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn update_total_amount_tx(
        conn: &mut PgConnection,
        id: Uuid,
        total: Decimal,
    ) -> Result<()> {
        query("UPDATE quote_requests SET total_amount = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Stamps the winning supplier and flips the request to
    /// CONVERTED_TO_ORDER. Conversion runs this only after the confirmation
    /// email has succeeded (or was skipped).
    pub async fn mark_converted_tx(
        conn: &mut PgConnection,
        id: Uuid,
        selected_supplier_id: Uuid,
    ) -> Result<()> {
        query(
            r#"
            UPDATE quote_requests
            SET status = $2, selected_supplier_id = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(QuoteRequestStatus::ConvertedToOrder.as_str())
        .bind(selected_supplier_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Upserts one extracted reply line, keyed by part number within this
    /// request. The replying supplier's existing line is updated first; an
    /// unpriced line with no supplier tag is claimed next; otherwise a new
    /// line is inserted. Re-parsing the same reply therefore never
    /// duplicates a line.
    pub async fn upsert_item_from_reply(
        conn: &mut PgConnection,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        item: &ExtractedQuoteItem,
    ) -> Result<()> {
        let availability = item.availability.as_deref().unwrap_or("UNKNOWN");

        let updated = query(
            r#"
            UPDATE quote_request_items
            SET unit_price = $4, quantity = $5, availability = $6, lead_time_days = $7,
                is_alternative = $8, superseded_by = COALESCE($9, superseded_by),
                supersedes = COALESCE($10, supersedes),
                supersession_notes = COALESCE($11, supersession_notes),
                description = COALESCE($12, description),
                updated_at = NOW()
            WHERE quote_request_id = $1 AND part_number = $2 AND supplier_id = $3
            "#,
        )
        .bind(quote_request_id)
        .bind(&item.part_number)
        .bind(supplier_id)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(availability)
        .bind(item.lead_time_days)
        .bind(item.is_alternative)
        .bind(&item.superseded_by)
        .bind(&item.supersedes)
        .bind(&item.supersession_notes)
        .bind(&item.description)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(());
        }

        let claimed = query(
            r#"
            UPDATE quote_request_items
            SET supplier_id = $3, unit_price = $4, quantity = $5, availability = $6,
                lead_time_days = $7, is_alternative = $8,
                superseded_by = COALESCE($9, superseded_by),
                supersedes = COALESCE($10, supersedes),
                supersession_notes = COALESCE($11, supersession_notes),
                description = COALESCE($12, description),
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM quote_request_items
                WHERE quote_request_id = $1 AND part_number = $2 AND supplier_id IS NULL
                ORDER BY created_at
                LIMIT 1
            )
            "#,
        )
        .bind(quote_request_id)
        .bind(&item.part_number)
        .bind(supplier_id)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(availability)
        .bind(item.lead_time_days)
        .bind(item.is_alternative)
        .bind(&item.superseded_by)
        .bind(&item.supersedes)
        .bind(&item.supersession_notes)
        .bind(&item.description)
        .execute(&mut *conn)
        .await?;

        if claimed.rows_affected() > 0 {
            return Ok(());
        }

        query(
            r#"
            INSERT INTO quote_request_items
                (quote_request_id, supplier_id, part_number, description, quantity,
                 unit_price, availability, lead_time_days, is_alternative,
                 superseded_by, supersedes, supersession_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(quote_request_id)
        .bind(supplier_id)
        .bind(&item.part_number)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(availability)
        .bind(item.lead_time_days)
        .bind(item.is_alternative)
        .bind(&item.superseded_by)
        .bind(&item.supersedes)
        .bind(&item.supersession_notes)
        .execute(conn)
        .await?;
        Ok(())
    }
}
