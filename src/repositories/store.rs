//! Persistence seam for the procurement workflows. Services depend on the
//! [`ProcurementStore`] trait instead of concrete repositories, so workflow
//! rules can be exercised against an in-memory store while production runs
//! on [`PgStore`]. Composite methods are the transactional units: each one
//! either fully applies or leaves no trace.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::activity::ActivityEntry;
use crate::models::email_thread::{
    EmailMessage, EmailThread, EmailThreadStatus, QuoteRequestEmailThread,
};
use crate::models::order::{FulfillmentMethod, Order, OrderItem};
use crate::models::quote_request::{QuoteRequest, QuoteRequestItem, QuoteRequestStatus};
use crate::models::supplier::Supplier;
use crate::models::user::Organization;
use crate::models::vehicle::Vehicle;
use crate::models::webhook::ExtractedQuoteItem;
use crate::repositories::email_thread_repo::NewEmailMessage;
use crate::repositories::order_repo::NewOrderItem;
use crate::repositories::{
    EmailThreadRepository, OrderRepository, PartRepository, QuoteRequestRepository,
    SupplierRepository, UserRepository, VehicleRepository,
};
use crate::services::activity_log::ActivityLogService;

/// One supplier's outbound RFQ dispatch: thread, outbound message, and
/// junction link, written atomically after the gateway accepted the send.
pub struct OutboundSend<'a> {
    pub organization_id: Uuid,
    pub quote_request_id: Uuid,
    pub supplier_id: Uuid,
    pub is_primary: bool,
    pub external_thread_id: Option<&'a str>,
    pub subject: &'a str,
    pub message: NewEmailMessage<'a>,
}

pub enum SendRecord {
    Created(Uuid),
    /// A concurrent send linked this supplier first; nothing was written.
    AlreadyLinked,
}

pub struct LinkResponse {
    pub link_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub quoted_amount: Option<Decimal>,
}

/// Everything one inbound reply changes, applied in a single transaction:
/// the appended message, extracted line items, the quote's total and status,
/// the thread status, and the link promotion.
pub struct ReplyApplication<'a> {
    pub thread_id: Uuid,
    pub message: NewEmailMessage<'a>,
    pub quote_request_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub items: &'a [ExtractedQuoteItem],
    pub total_amount: Option<Decimal>,
    pub quote_status: Option<QuoteRequestStatus>,
    pub thread_status: EmailThreadStatus,
    pub link_response: Option<LinkResponse>,
}

pub struct NewOrder<'a> {
    pub organization_id: Uuid,
    pub order_number: &'a str,
    pub supplier_id: Uuid,
    pub quote_request_id: Uuid,
    pub fulfillment_method: FulfillmentMethod,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub notes: Option<&'a str>,
    pub created_by: Uuid,
}

pub struct NewOrderLine<'a> {
    pub part_number: &'a str,
    pub description: Option<&'a str>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub availability: &'a str,
    pub expected_delivery: Option<NaiveDate>,
    pub superseded_by: Option<&'a str>,
    pub supersedes: Option<&'a str>,
    pub supersession_notes: Option<&'a str>,
}

pub enum LinkOutcome {
    Linked(QuoteRequestEmailThread),
    AlreadyLinked,
}

/// What an orphan attachment actually wrote. The singular column is only
/// taken when the request has no directly linked thread yet, so the outcome
/// tells the caller which association landed.
pub struct AttachOutcome {
    pub directly_assigned: bool,
    pub junction_linked: bool,
}

#[async_trait]
pub trait ProcurementStore: Send + Sync {
    // Quote requests
    async fn find_quote_request(&self, organization_id: Uuid, id: Uuid)
        -> Result<Option<QuoteRequest>>;
    async fn quote_items(&self, quote_request_id: Uuid) -> Result<Vec<QuoteRequestItem>>;
    async fn quote_items_for_supplier(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Vec<QuoteRequestItem>>;
    async fn update_quote_status(
        &self,
        quote_request_id: Uuid,
        status: QuoteRequestStatus,
    ) -> Result<()>;
    /// Upserts extracted lines for one supplier and refreshes the quote
    /// total, atomically. Returns the number of lines applied.
    async fn apply_extraction(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        items: &[ExtractedQuoteItem],
        total_amount: Option<Decimal>,
    ) -> Result<usize>;

    // Directory
    async fn find_supplier(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Supplier>>;
    async fn suppliers_by_ids(&self, organization_id: Uuid, ids: &[Uuid])
        -> Result<Vec<Supplier>>;
    async fn append_supplier_aux_email(&self, supplier_id: Uuid, address: &str) -> Result<()>;
    async fn find_organization(&self, organization_id: Uuid) -> Result<Option<Organization>>;
    async fn find_vehicle(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Vehicle>>;

    // Threads and messages
    async fn find_thread(&self, organization_id: Uuid, id: Uuid) -> Result<Option<EmailThread>>;
    async fn find_thread_by_external_id(
        &self,
        organization_id: Uuid,
        external_thread_id: &str,
    ) -> Result<Option<EmailThread>>;
    async fn find_legacy_thread(&self, quote_request_id: Uuid) -> Result<Option<EmailThread>>;
    /// Threads correlated with the request through either the junction or
    /// the legacy singular column.
    async fn candidate_threads(&self, quote_request_id: Uuid) -> Result<Vec<EmailThread>>;
    async fn thread_messages(&self, thread_id: Uuid) -> Result<Vec<EmailMessage>>;
    async fn first_message(&self, thread_id: Uuid) -> Result<Option<EmailMessage>>;
    async fn earliest_outbound_recipient(&self, thread_id: Uuid) -> Result<Option<String>>;
    async fn earliest_inbound_at(&self, thread_id: Uuid) -> Result<Option<DateTime<Utc>>>;
    async fn append_message(&self, thread_id: Uuid, message: NewEmailMessage<'_>) -> Result<()>;

    // Junction links
    async fn find_link(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>>;
    async fn find_link_for_thread(
        &self,
        email_thread_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>>;
    async fn links_for_request(
        &self,
        quote_request_id: Uuid,
    ) -> Result<Vec<QuoteRequestEmailThread>>;
    async fn mark_link_responded(
        &self,
        link_id: Uuid,
        response_date: DateTime<Utc>,
        quoted_amount: Option<Decimal>,
    ) -> Result<()>;
    async fn delete_links_for_request(&self, quote_request_id: Uuid) -> Result<u64>;
    async fn link_thread(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        email_thread_id: Uuid,
        is_primary: bool,
    ) -> Result<LinkOutcome>;

    // Composite workflow writes
    async fn record_outbound_send(&self, send: OutboundSend<'_>) -> Result<SendRecord>;
    async fn apply_inbound_reply(&self, reply: ReplyApplication<'_>) -> Result<usize>;
    async fn attach_orphan(
        &self,
        thread_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> Result<AttachOutcome>;
    /// Folds source into target: messages move, target adopts missing
    /// association data, the source row disappears. Returns messages moved.
    async fn merge_threads(&self, source: &EmailThread, target: &EmailThread) -> Result<u64>;

    // Orders
    async fn find_order(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Order>>;
    async fn find_pending_order(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Order>>;
    async fn next_order_sequence(&self, organization_id: Uuid) -> Result<i64>;
    /// Writes the order and its lines in one transaction. A colliding order
    /// number surfaces as `Conflict` with nothing written.
    async fn create_order(&self, order: NewOrder<'_>, lines: &[NewOrderLine<'_>])
        -> Result<Order>;
    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>>;
    /// Settles a conversion once the confirmation gate has passed: order
    /// confirmed, quote converted, links accepted/rejected, thread retired.
    async fn finalize_conversion(
        &self,
        order_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        thread_id: Option<Uuid>,
    ) -> Result<()>;

    // Audit trail; best-effort, never fails the caller.
    async fn record_activity(&self, entry: ActivityEntry);
}

pub struct PgStore {
    pool: PgPool,
    quote_repo: QuoteRequestRepository,
    thread_repo: EmailThreadRepository,
    supplier_repo: SupplierRepository,
    vehicle_repo: VehicleRepository,
    user_repo: UserRepository,
    order_repo: OrderRepository,
    activity: ActivityLogService,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            quote_repo: QuoteRequestRepository::new(pool.clone()),
            thread_repo: EmailThreadRepository::new(pool.clone()),
            supplier_repo: SupplierRepository::new(pool.clone()),
            vehicle_repo: VehicleRepository::new(pool.clone()),
            user_repo: UserRepository::new(pool.clone()),
            order_repo: OrderRepository::new(pool.clone()),
            activity: ActivityLogService::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl ProcurementStore for PgStore {
    async fn find_quote_request(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<QuoteRequest>> {
        self.quote_repo.find_by_id(organization_id, id).await
    }

    async fn quote_items(&self, quote_request_id: Uuid) -> Result<Vec<QuoteRequestItem>> {
        self.quote_repo.items(quote_request_id).await
    }

    async fn quote_items_for_supplier(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Vec<QuoteRequestItem>> {
        self.quote_repo
            .items_for_supplier(quote_request_id, supplier_id)
            .await
    }

    async fn update_quote_status(
        &self,
        quote_request_id: Uuid,
        status: QuoteRequestStatus,
    ) -> Result<()> {
        self.quote_repo.update_status(quote_request_id, status).await
    }

    async fn apply_extraction(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        items: &[ExtractedQuoteItem],
        total_amount: Option<Decimal>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0usize;
        for item in items {
            QuoteRequestRepository::upsert_item_from_reply(
                &mut tx,
                quote_request_id,
                supplier_id,
                item,
            )
            .await?;
            count += 1;
        }
        if let Some(total) = total_amount {
            QuoteRequestRepository::update_total_amount_tx(&mut tx, quote_request_id, total)
                .await?;
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn find_supplier(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Supplier>> {
        self.supplier_repo.find_by_id(organization_id, id).await
    }

    async fn suppliers_by_ids(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Supplier>> {
        self.supplier_repo.find_many_by_ids(organization_id, ids).await
    }

    async fn append_supplier_aux_email(&self, supplier_id: Uuid, address: &str) -> Result<()> {
        self.supplier_repo.append_aux_email(supplier_id, address).await
    }

    async fn find_organization(&self, organization_id: Uuid) -> Result<Option<Organization>> {
        self.user_repo.find_organization(organization_id).await
    }

    async fn find_vehicle(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Vehicle>> {
        self.vehicle_repo.find_by_id(organization_id, id).await
    }

    async fn find_thread(&self, organization_id: Uuid, id: Uuid) -> Result<Option<EmailThread>> {
        self.thread_repo.find_by_id(organization_id, id).await
    }

    async fn find_thread_by_external_id(
        &self,
        organization_id: Uuid,
        external_thread_id: &str,
    ) -> Result<Option<EmailThread>> {
        self.thread_repo
            .find_by_external_id(organization_id, external_thread_id)
            .await
    }

    async fn find_legacy_thread(&self, quote_request_id: Uuid) -> Result<Option<EmailThread>> {
        self.thread_repo.find_legacy_thread(quote_request_id).await
    }

    async fn candidate_threads(&self, quote_request_id: Uuid) -> Result<Vec<EmailThread>> {
        self.thread_repo.threads_for_quote_request(quote_request_id).await
    }

    async fn thread_messages(&self, thread_id: Uuid) -> Result<Vec<EmailMessage>> {
        self.thread_repo.messages(thread_id).await
    }

    async fn first_message(&self, thread_id: Uuid) -> Result<Option<EmailMessage>> {
        self.thread_repo.first_message(thread_id).await
    }

    async fn earliest_outbound_recipient(&self, thread_id: Uuid) -> Result<Option<String>> {
        self.thread_repo.earliest_outbound_recipient(thread_id).await
    }

    async fn earliest_inbound_at(&self, thread_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        self.thread_repo.earliest_inbound_at(thread_id).await
    }

    async fn append_message(&self, thread_id: Uuid, message: NewEmailMessage<'_>) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        EmailThreadRepository::insert_message_tx(&mut conn, thread_id, message).await?;
        Ok(())
    }

    async fn find_link(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>> {
        self.thread_repo.find_link(quote_request_id, supplier_id).await
    }

    async fn find_link_for_thread(
        &self,
        email_thread_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>> {
        self.thread_repo.find_link_for_thread(email_thread_id).await
    }

    async fn links_for_request(
        &self,
        quote_request_id: Uuid,
    ) -> Result<Vec<QuoteRequestEmailThread>> {
        self.thread_repo.links_for_request(quote_request_id).await
    }

    async fn mark_link_responded(
        &self,
        link_id: Uuid,
        response_date: DateTime<Utc>,
        quoted_amount: Option<Decimal>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        EmailThreadRepository::mark_link_responded_tx(
            &mut conn,
            link_id,
            response_date,
            quoted_amount,
        )
        .await
    }

    async fn delete_links_for_request(&self, quote_request_id: Uuid) -> Result<u64> {
        self.thread_repo.delete_links_for_request(quote_request_id).await
    }

    async fn link_thread(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        email_thread_id: Uuid,
        is_primary: bool,
    ) -> Result<LinkOutcome> {
        let mut tx = self.pool.begin().await?;
        let created = EmailThreadRepository::create_link_tx(
            &mut tx,
            quote_request_id,
            supplier_id,
            email_thread_id,
            is_primary,
        )
        .await;
        match created {
            Ok(link) => {
                tx.commit().await?;
                Ok(LinkOutcome::Linked(link))
            }
            Err(AppError::Conflict(_)) => {
                tx.rollback().await?;
                Ok(LinkOutcome::AlreadyLinked)
            }
            Err(e) => Err(e),
        }
    }

    async fn record_outbound_send(&self, send: OutboundSend<'_>) -> Result<SendRecord> {
        let mut tx = self.pool.begin().await?;

        // At most one thread may point directly at the request; the primary
        // supplier's thread takes the slot if it is still free. Everyone is
        // correlated through the junction regardless.
        let link_directly = send.is_primary
            && !EmailThreadRepository::has_direct_thread_tx(&mut tx, send.quote_request_id)
                .await?;

        let thread = EmailThreadRepository::create_thread_tx(
            &mut tx,
            send.organization_id,
            send.supplier_id,
            link_directly.then_some(send.quote_request_id),
            send.external_thread_id,
            Some(send.subject),
            EmailThreadStatus::Sent,
        )
        .await?;

        EmailThreadRepository::insert_message_tx(&mut tx, thread.id, send.message).await?;

        match EmailThreadRepository::create_link_tx(
            &mut tx,
            send.quote_request_id,
            send.supplier_id,
            thread.id,
            send.is_primary,
        )
        .await
        {
            Ok(_) => {
                tx.commit().await?;
                Ok(SendRecord::Created(thread.id))
            }
            // A concurrent send already linked this supplier; drop our
            // duplicate thread by rolling the transaction back.
            Err(AppError::Conflict(_)) => {
                tx.rollback().await?;
                Ok(SendRecord::AlreadyLinked)
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_inbound_reply(&self, reply: ReplyApplication<'_>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        EmailThreadRepository::insert_message_tx(&mut tx, reply.thread_id, reply.message).await?;

        let mut items_upserted = 0usize;
        if let Some(quote_request_id) = reply.quote_request_id {
            if let Some(supplier_id) = reply.supplier_id {
                for item in reply.items {
                    QuoteRequestRepository::upsert_item_from_reply(
                        &mut tx,
                        quote_request_id,
                        supplier_id,
                        item,
                    )
                    .await?;
                    items_upserted += 1;
                }
            }
            if let Some(total) = reply.total_amount {
                QuoteRequestRepository::update_total_amount_tx(&mut tx, quote_request_id, total)
                    .await?;
            }
            if let Some(status) = reply.quote_status {
                QuoteRequestRepository::update_status_tx(&mut tx, quote_request_id, status)
                    .await?;
            }
        }

        EmailThreadRepository::update_status_tx(&mut tx, reply.thread_id, reply.thread_status)
            .await?;

        if let Some(link) = reply.link_response {
            EmailThreadRepository::mark_link_responded_tx(
                &mut tx,
                link.link_id,
                link.received_at,
                link.quoted_amount,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(items_upserted)
    }

    async fn attach_orphan(
        &self,
        thread_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> Result<AttachOutcome> {
        let mut tx = self.pool.begin().await?;

        let directly_assigned =
            !EmailThreadRepository::has_direct_thread_tx(&mut tx, quote_request_id).await?;
        if directly_assigned {
            EmailThreadRepository::assign_quote_request_tx(&mut tx, thread_id, quote_request_id)
                .await?;
        }

        let mut junction_linked = false;
        if let Some(sid) = supplier_id {
            // Retroactive junction link; a concurrent duplicate is fine.
            match EmailThreadRepository::create_link_tx(
                &mut tx,
                quote_request_id,
                sid,
                thread_id,
                false,
            )
            .await
            {
                Ok(_) => junction_linked = true,
                Err(AppError::Conflict(_)) => {}
                Err(e) => {
                    tx.rollback().await?;
                    return Err(e);
                }
            }
        }
        tx.commit().await?;

        Ok(AttachOutcome {
            directly_assigned,
            junction_linked,
        })
    }

    async fn merge_threads(&self, source: &EmailThread, target: &EmailThread) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let moved =
            EmailThreadRepository::move_messages_tx(&mut tx, source.id, target.id).await?;
        if target.quote_request_id.is_none() {
            if let Some(qr_id) = source.quote_request_id {
                EmailThreadRepository::assign_quote_request_tx(&mut tx, target.id, qr_id).await?;
            }
        }
        if target.external_thread_id.is_none() {
            if let Some(ref external_id) = source.external_thread_id {
                EmailThreadRepository::adopt_external_id_tx(&mut tx, target.id, external_id)
                    .await?;
            }
        }
        EmailThreadRepository::delete_thread_tx(&mut tx, source.id).await?;
        tx.commit().await?;
        Ok(moved)
    }

    async fn find_order(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Order>> {
        self.order_repo.find_by_id(organization_id, id).await
    }

    async fn find_pending_order(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Order>> {
        self.order_repo
            .find_pending_for_quote(organization_id, quote_request_id, supplier_id)
            .await
    }

    async fn next_order_sequence(&self, organization_id: Uuid) -> Result<i64> {
        Ok(self.order_repo.count_for_organization(organization_id).await? + 1)
    }

    async fn create_order(
        &self,
        order: NewOrder<'_>,
        lines: &[NewOrderLine<'_>],
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let created = OrderRepository::create_tx(
            &mut tx,
            order.organization_id,
            order.order_number,
            order.supplier_id,
            order.quote_request_id,
            order.fulfillment_method,
            order.subtotal,
            order.tax,
            order.shipping,
            order.total,
            order.notes,
            order.created_by,
        )
        .await?;

        for line in lines {
            let part = PartRepository::resolve_or_create(
                &mut tx,
                order.organization_id,
                line.part_number,
                line.description,
                Some(line.unit_price),
                line.superseded_by,
                line.supersedes,
                line.supersession_notes,
            )
            .await?;

            OrderRepository::insert_item_tx(
                &mut tx,
                created.id,
                NewOrderItem {
                    part_id: part.id,
                    part_number: line.part_number,
                    description: line.description,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    fulfillment_method: order.fulfillment_method,
                    availability: line.availability,
                    expected_delivery: line.expected_delivery,
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        self.order_repo.items(order_id).await
    }

    async fn finalize_conversion(
        &self,
        order_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        thread_id: Option<Uuid>,
    ) -> Result<()> {
        use crate::models::order::OrderStatus;

        let mut tx = self.pool.begin().await?;
        OrderRepository::update_status_tx(&mut tx, order_id, OrderStatus::Confirmed).await?;
        QuoteRequestRepository::mark_converted_tx(&mut tx, quote_request_id, supplier_id).await?;
        EmailThreadRepository::settle_links_tx(&mut tx, quote_request_id, supplier_id).await?;
        if let Some(thread_id) = thread_id {
            EmailThreadRepository::set_order_tx(&mut tx, thread_id, order_id).await?;
            EmailThreadRepository::update_status_tx(
                &mut tx,
                thread_id,
                EmailThreadStatus::ConvertedToOrder,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_activity(&self, entry: ActivityEntry) {
        self.activity.record(entry).await;
    }
}
