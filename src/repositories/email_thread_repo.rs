use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{query, query_as, query_scalar, PgConnection, PgPool};
use uuid::Uuid;
use crate::middleware::error_handling::Result;
use crate::models::email_thread::{
    EmailAttachment, EmailMessage, EmailThread, EmailThreadStatus, MessageDirection,
    QuoteRequestEmailThread, ThreadLinkStatus,
};

pub struct NewEmailMessage<'a> {
    pub direction: MessageDirection,
    pub from_address: &'a str,
    pub to_address: &'a str,
    pub subject: Option<&'a str>,
    pub body: Option<&'a str>,
    pub body_html: Option<&'a str>,
    pub external_message_id: Option<&'a str>,
    pub attachments: Vec<EmailAttachment>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
}

pub struct EmailThreadRepository {
    pool: PgPool,
}

impl EmailThreadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_thread_tx(
        conn: &mut PgConnection,
        organization_id: Uuid,
        supplier_id: Uuid,
        quote_request_id: Option<Uuid>,
        external_thread_id: Option<&str>,
        subject: Option<&str>,
        status: EmailThreadStatus,
    ) -> Result<EmailThread> {
        let thread = query_as::<_, EmailThread>(
            r#"
            INSERT INTO email_threads
                (organization_id, supplier_id, quote_request_id, external_thread_id, subject, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(supplier_id)
        .bind(quote_request_id)
        .bind(external_thread_id)
        .bind(subject)
        .bind(status.as_str())
        .fetch_one(conn)
        .await?;
        Ok(thread)
    }

    pub async fn find_by_id(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<EmailThread>> {
        let thread = query_as::<_, EmailThread>(
            "SELECT * FROM email_threads WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(thread)
    }

    pub async fn find_by_external_id(
        &self,
        organization_id: Uuid,
        external_thread_id: &str,
    ) -> Result<Option<EmailThread>> {
        let thread = query_as::<_, EmailThread>(
            "SELECT * FROM email_threads WHERE organization_id = $1 AND external_thread_id = $2",
        )
        .bind(organization_id)
        .bind(external_thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(thread)
    }

    /// Legacy singular association: the first thread pointing directly at the
    /// request. Multi-supplier correlation goes through the junction instead.
    pub async fn find_legacy_thread(
        &self,
        quote_request_id: Uuid,
    ) -> Result<Option<EmailThread>> {
        let thread = query_as::<_, EmailThread>(
            "SELECT * FROM email_threads WHERE quote_request_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(quote_request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(thread)
    }

    /// Every thread correlated with the request, whether through the junction
    /// or the legacy singular column.
    pub async fn threads_for_quote_request(
        &self,
        quote_request_id: Uuid,
    ) -> Result<Vec<EmailThread>> {
        let threads = query_as::<_, EmailThread>(
            r#"
            SELECT t.* FROM email_threads t
            WHERE t.quote_request_id = $1
               OR EXISTS (
                   SELECT 1 FROM quote_request_email_threads l
                   WHERE l.email_thread_id = t.id AND l.quote_request_id = $1
               )
            ORDER BY t.created_at
            "#,
        )
        .bind(quote_request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(threads)
    }

    /// Whether the request already has a thread pointing at it through the
    /// legacy singular column. At most one thread may do so.
    pub async fn has_direct_thread_tx(
        conn: &mut PgConnection,
        quote_request_id: Uuid,
    ) -> Result<bool> {
        let found: Option<i32> =
            query_scalar("SELECT 1 FROM email_threads WHERE quote_request_id = $1 LIMIT 1")
                .bind(quote_request_id)
                .fetch_optional(conn)
                .await?;
        Ok(found.is_some())
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<EmailThread>> {
        let limit = limit.unwrap_or(50).min(100);
        let offset = offset.unwrap_or(0);

        let threads = query_as::<_, EmailThread>(
            "SELECT * FROM email_threads WHERE organization_id = $1 ORDER BY updated_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(threads)
    }

    pub async fn list_orphaned(&self, organization_id: Uuid) -> Result<Vec<EmailThread>> {
        let threads = query_as::<_, EmailThread>(
            r#"
            SELECT t.* FROM email_threads t
            WHERE t.organization_id = $1 AND t.quote_request_id IS NULL AND t.order_id IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM quote_request_email_threads l
                  WHERE l.email_thread_id = t.id
              )
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(threads)
    }

    pub async fn update_status(&self, id: Uuid, status: EmailThreadStatus) -> Result<()> {
        query("UPDATE email_threads SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_status_tx(
        conn: &mut PgConnection,
        id: Uuid,
        status: EmailThreadStatus,
    ) -> Result<()> {
        query("UPDATE email_threads SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn assign_quote_request_tx(
        conn: &mut PgConnection,
        thread_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<()> {
        query("UPDATE email_threads SET quote_request_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(thread_id)
            .bind(quote_request_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Fills in the provider correlation id only when the thread does not
    /// already carry one, so merges never clobber an existing id.
    pub async fn adopt_external_id_tx(
        conn: &mut PgConnection,
        thread_id: Uuid,
        external_thread_id: &str,
    ) -> Result<()> {
        query(
            r#"
            UPDATE email_threads
            SET external_thread_id = $2, updated_at = NOW()
            WHERE id = $1 AND external_thread_id IS NULL
            "#,
        )
        .bind(thread_id)
        .bind(external_thread_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn set_order_tx(
        conn: &mut PgConnection,
        thread_id: Uuid,
        order_id: Uuid,
    ) -> Result<()> {
        query("UPDATE email_threads SET order_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(thread_id)
            .bind(order_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn insert_message_tx(
        conn: &mut PgConnection,
        thread_id: Uuid,
        message: NewEmailMessage<'_>,
    ) -> Result<EmailMessage> {
        let inserted = query_as::<_, EmailMessage>(
            r#"
            INSERT INTO email_messages
                (thread_id, direction, from_address, to_address, subject, body, body_html,
                 external_message_id, attachments, sent_at, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(thread_id)
        .bind(message.direction.as_str())
        .bind(message.from_address)
        .bind(message.to_address)
        .bind(message.subject)
        .bind(message.body)
        .bind(message.body_html)
        .bind(message.external_message_id)
        .bind(Json(message.attachments))
        .bind(message.sent_at)
        .bind(message.received_at)
        .fetch_one(conn)
        .await?;
        Ok(inserted)
    }

    pub async fn messages(&self, thread_id: Uuid) -> Result<Vec<EmailMessage>> {
        let messages = query_as::<_, EmailMessage>(
            "SELECT * FROM email_messages WHERE thread_id = $1 ORDER BY created_at",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    pub async fn first_message(&self, thread_id: Uuid) -> Result<Option<EmailMessage>> {
        let message = query_as::<_, EmailMessage>(
            "SELECT * FROM email_messages WHERE thread_id = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    /// Recipient of the earliest outbound message; the address sync matches
    /// against supplier emails.
    pub async fn earliest_outbound_recipient(&self, thread_id: Uuid) -> Result<Option<String>> {
        let recipient: Option<String> = query_scalar(
            r#"
            SELECT to_address FROM email_messages
            WHERE thread_id = $1 AND direction = 'OUTBOUND'
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(recipient)
    }

    /// Timestamp of the earliest inbound message, used to stamp
    /// response_date during status promotion.
    pub async fn earliest_inbound_at(&self, thread_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let at: Option<DateTime<Utc>> = query_scalar(
            r#"
            SELECT COALESCE(received_at, created_at) FROM email_messages
            WHERE thread_id = $1 AND direction = 'INBOUND'
            ORDER BY COALESCE(received_at, created_at)
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(at)
    }

    /// Moves every message from source to target. Caller wraps this together
    /// with the source delete in one transaction; partial merges must never
    /// be observable.
    pub async fn move_messages_tx(
        conn: &mut PgConnection,
        source_thread_id: Uuid,
        target_thread_id: Uuid,
    ) -> Result<u64> {
        let result = query("UPDATE email_messages SET thread_id = $2 WHERE thread_id = $1")
            .bind(source_thread_id)
            .bind(target_thread_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_thread_tx(conn: &mut PgConnection, id: Uuid) -> Result<bool> {
        let result = query("DELETE FROM email_threads WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ------------------------------------------------------------------
    // Junction links (quote_request_email_threads)
    // ------------------------------------------------------------------

    pub async fn create_link_tx(
        conn: &mut PgConnection,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        email_thread_id: Uuid,
        is_primary: bool,
    ) -> Result<QuoteRequestEmailThread> {
        let link = query_as::<_, QuoteRequestEmailThread>(
            r#"
            INSERT INTO quote_request_email_threads
                (quote_request_id, supplier_id, email_thread_id, status, is_primary)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(quote_request_id)
        .bind(supplier_id)
        .bind(email_thread_id)
        .bind(ThreadLinkStatus::Sent.as_str())
        .bind(is_primary)
        .fetch_one(conn)
        .await?;
        Ok(link)
    }

    pub async fn find_link(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>> {
        let link = query_as::<_, QuoteRequestEmailThread>(
            "SELECT * FROM quote_request_email_threads WHERE quote_request_id = $1 AND supplier_id = $2",
        )
        .bind(quote_request_id)
        .bind(supplier_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }

    pub async fn find_link_for_thread(
        &self,
        email_thread_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>> {
        let link = query_as::<_, QuoteRequestEmailThread>(
            "SELECT * FROM quote_request_email_threads WHERE email_thread_id = $1",
        )
        .bind(email_thread_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(link)
    }

    pub async fn links_for_request(
        &self,
        quote_request_id: Uuid,
    ) -> Result<Vec<QuoteRequestEmailThread>> {
        let links = query_as::<_, QuoteRequestEmailThread>(
            "SELECT * FROM quote_request_email_threads WHERE quote_request_id = $1 ORDER BY created_at",
        )
        .bind(quote_request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    pub async fn mark_link_responded_tx(
        conn: &mut PgConnection,
        link_id: Uuid,
        response_date: DateTime<Utc>,
        quoted_amount: Option<Decimal>,
    ) -> Result<()> {
        query(
            r#"
            UPDATE quote_request_email_threads
            SET status = $2, response_date = COALESCE(response_date, $3),
                quoted_amount = COALESCE($4, quoted_amount), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(link_id)
        .bind(ThreadLinkStatus::Responded.as_str())
        .bind(response_date)
        .bind(quoted_amount)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Conversion outcome: the chosen supplier's link becomes ACCEPTED,
    /// every other link on the request becomes REJECTED.
    pub async fn settle_links_tx(
        conn: &mut PgConnection,
        quote_request_id: Uuid,
        accepted_supplier_id: Uuid,
    ) -> Result<()> {
        query(
            r#"
            UPDATE quote_request_email_threads
            SET status = CASE WHEN supplier_id = $2 THEN $3 ELSE $4 END,
                updated_at = NOW()
            WHERE quote_request_id = $1
            "#,
        )
        .bind(quote_request_id)
        .bind(accepted_supplier_id)
        .bind(ThreadLinkStatus::Accepted.as_str())
        .bind(ThreadLinkStatus::Rejected.as_str())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn delete_links_for_request(&self, quote_request_id: Uuid) -> Result<u64> {
        let result = query("DELETE FROM quote_request_email_threads WHERE quote_request_id = $1")
            .bind(quote_request_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
