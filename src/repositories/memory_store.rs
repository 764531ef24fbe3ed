//! In-memory [`ProcurementStore`] for exercising workflow rules without a
//! database. Mirrors the Postgres semantics the services rely on: the
//! unique (quote_request, supplier) link constraint, the three-phase line
//! upsert, and the at-most-one directly linked thread per request.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::activity::ActivityEntry;
use crate::models::email_thread::{
    EmailMessage, EmailThread, EmailThreadStatus, QuoteRequestEmailThread, ThreadLinkStatus,
};
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::quote_request::{QuoteRequest, QuoteRequestItem, QuoteRequestStatus};
use crate::models::supplier::Supplier;
use crate::models::user::Organization;
use crate::models::vehicle::Vehicle;
use crate::models::webhook::ExtractedQuoteItem;
use crate::models::supplier_ids;
use crate::repositories::email_thread_repo::NewEmailMessage;
use crate::repositories::store::{
    AttachOutcome, LinkOutcome, NewOrder, NewOrderLine, OutboundSend, ProcurementStore,
    ReplyApplication, SendRecord,
};

#[derive(Default)]
struct State {
    quotes: Vec<QuoteRequest>,
    quote_items: Vec<QuoteRequestItem>,
    suppliers: Vec<Supplier>,
    organizations: Vec<Organization>,
    vehicles: Vec<Vehicle>,
    threads: Vec<EmailThread>,
    messages: Vec<EmailMessage>,
    links: Vec<QuoteRequestEmailThread>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    activities: Vec<ActivityEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // ---- seeding ----

    pub fn add_organization(&self, org: Organization) {
        self.lock().organizations.push(org);
    }

    pub fn add_supplier(&self, supplier: Supplier) {
        self.lock().suppliers.push(supplier);
    }

    pub fn add_quote_request(&self, quote: QuoteRequest) {
        self.lock().quotes.push(quote);
    }

    pub fn add_quote_item(&self, item: QuoteRequestItem) {
        self.lock().quote_items.push(item);
    }

    pub fn add_thread(&self, thread: EmailThread) {
        self.lock().threads.push(thread);
    }

    pub fn add_link(&self, link: QuoteRequestEmailThread) {
        self.lock().links.push(link);
    }

    pub fn add_message(&self, message: EmailMessage) {
        self.lock().messages.push(message);
    }

    // ---- assertion accessors ----

    pub fn quote(&self, id: Uuid) -> QuoteRequest {
        self.lock().quotes.iter().find(|q| q.id == id).cloned().unwrap()
    }

    pub fn quote_lines(&self, quote_request_id: Uuid) -> Vec<QuoteRequestItem> {
        self.lock()
            .quote_items
            .iter()
            .filter(|i| i.quote_request_id == quote_request_id)
            .cloned()
            .collect()
    }

    pub fn threads(&self) -> Vec<EmailThread> {
        self.lock().threads.clone()
    }

    pub fn thread(&self, id: Uuid) -> Option<EmailThread> {
        self.lock().threads.iter().find(|t| t.id == id).cloned()
    }

    pub fn links(&self) -> Vec<QuoteRequestEmailThread> {
        self.lock().links.clone()
    }

    pub fn messages_for(&self, thread_id: Uuid) -> Vec<EmailMessage> {
        self.lock()
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    pub fn order_lines(&self, order_id: Uuid) -> Vec<OrderItem> {
        self.lock()
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn supplier_record(&self, id: Uuid) -> Supplier {
        self.lock().suppliers.iter().find(|s| s.id == id).cloned().unwrap()
    }

    pub fn activities(&self) -> Vec<ActivityEntry> {
        self.lock().activities.clone()
    }
}

fn owned_message(thread_id: Uuid, message: NewEmailMessage<'_>) -> EmailMessage {
    EmailMessage {
        id: Uuid::new_v4(),
        thread_id,
        direction: message.direction.as_str().to_string(),
        from_address: message.from_address.to_string(),
        to_address: message.to_address.to_string(),
        subject: message.subject.map(String::from),
        body: message.body.map(String::from),
        body_html: message.body_html.map(String::from),
        external_message_id: message.external_message_id.map(String::from),
        attachments: Json(message.attachments),
        sent_at: message.sent_at,
        received_at: message.received_at,
        created_at: Utc::now(),
    }
}

fn new_link(
    quote_request_id: Uuid,
    supplier_id: Uuid,
    email_thread_id: Uuid,
    is_primary: bool,
) -> QuoteRequestEmailThread {
    QuoteRequestEmailThread {
        id: Uuid::new_v4(),
        quote_request_id,
        supplier_id,
        email_thread_id,
        status: ThreadLinkStatus::Sent.as_str().to_string(),
        is_primary,
        quoted_amount: None,
        response_date: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Same three-phase dedup as the SQL upsert: update the supplier's own line,
/// else claim the oldest unclaimed line for the part, else insert.
fn upsert_line(
    state: &mut State,
    quote_request_id: Uuid,
    supplier_id: Uuid,
    item: &ExtractedQuoteItem,
) {
    let availability = item.availability.as_deref().unwrap_or("UNKNOWN").to_string();

    let own = state.quote_items.iter_mut().find(|line| {
        line.quote_request_id == quote_request_id
            && line.part_number == item.part_number
            && line.supplier_id == Some(supplier_id)
    });
    if let Some(line) = own {
        apply_extracted_fields(line, item, &availability);
        return;
    }

    let unclaimed = state
        .quote_items
        .iter_mut()
        .filter(|line| {
            line.quote_request_id == quote_request_id
                && line.part_number == item.part_number
                && line.supplier_id.is_none()
        })
        .min_by_key(|line| line.created_at);
    if let Some(line) = unclaimed {
        line.supplier_id = Some(supplier_id);
        apply_extracted_fields(line, item, &availability);
        return;
    }

    state.quote_items.push(QuoteRequestItem {
        id: Uuid::new_v4(),
        quote_request_id,
        supplier_id: Some(supplier_id),
        part_number: item.part_number.clone(),
        description: item.description.clone(),
        quantity: item.quantity,
        unit_price: item.unit_price,
        availability,
        lead_time_days: item.lead_time_days,
        is_alternative: item.is_alternative,
        superseded_by: item.superseded_by.clone(),
        supersedes: item.supersedes.clone(),
        supersession_notes: item.supersession_notes.clone(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });
}

fn apply_extracted_fields(line: &mut QuoteRequestItem, item: &ExtractedQuoteItem, availability: &str) {
    line.unit_price = item.unit_price;
    line.quantity = item.quantity;
    line.availability = availability.to_string();
    line.lead_time_days = item.lead_time_days;
    line.is_alternative = item.is_alternative;
    if item.superseded_by.is_some() {
        line.superseded_by = item.superseded_by.clone();
    }
    if item.supersedes.is_some() {
        line.supersedes = item.supersedes.clone();
    }
    if item.supersession_notes.is_some() {
        line.supersession_notes = item.supersession_notes.clone();
    }
    if item.description.is_some() {
        line.description = item.description.clone();
    }
    line.updated_at = Utc::now();
}

#[async_trait]
impl ProcurementStore for MemoryStore {
    async fn find_quote_request(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<QuoteRequest>> {
        Ok(self
            .lock()
            .quotes
            .iter()
            .find(|q| q.id == id && q.organization_id == organization_id)
            .cloned())
    }

    async fn quote_items(&self, quote_request_id: Uuid) -> Result<Vec<QuoteRequestItem>> {
        Ok(self.quote_lines(quote_request_id))
    }

    async fn quote_items_for_supplier(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Vec<QuoteRequestItem>> {
        Ok(self
            .lock()
            .quote_items
            .iter()
            .filter(|i| {
                i.quote_request_id == quote_request_id
                    && i.supplier_id == Some(supplier_id)
                    && i.unit_price.is_some()
            })
            .cloned()
            .collect())
    }

    async fn update_quote_status(
        &self,
        quote_request_id: Uuid,
        status: QuoteRequestStatus,
    ) -> Result<()> {
        let mut state = self.lock();
        if let Some(quote) = state.quotes.iter_mut().find(|q| q.id == quote_request_id) {
            quote.status = status.as_str().to_string();
            quote.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn apply_extraction(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        items: &[ExtractedQuoteItem],
        total_amount: Option<Decimal>,
    ) -> Result<usize> {
        let mut state = self.lock();
        for item in items {
            upsert_line(&mut state, quote_request_id, supplier_id, item);
        }
        if let Some(total) = total_amount {
            if let Some(quote) = state.quotes.iter_mut().find(|q| q.id == quote_request_id) {
                quote.total_amount = Some(total);
            }
        }
        Ok(items.len())
    }

    async fn find_supplier(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Supplier>> {
        Ok(self
            .lock()
            .suppliers
            .iter()
            .find(|s| s.id == id && s.organization_id == organization_id)
            .cloned())
    }

    async fn suppliers_by_ids(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Supplier>> {
        Ok(self
            .lock()
            .suppliers
            .iter()
            .filter(|s| s.organization_id == organization_id && ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn append_supplier_aux_email(&self, supplier_id: Uuid, address: &str) -> Result<()> {
        let mut state = self.lock();
        if let Some(supplier) = state.suppliers.iter_mut().find(|s| s.id == supplier_id) {
            supplier.aux_emails.0.push(address.to_string());
        }
        Ok(())
    }

    async fn find_organization(&self, organization_id: Uuid) -> Result<Option<Organization>> {
        Ok(self
            .lock()
            .organizations
            .iter()
            .find(|o| o.id == organization_id)
            .cloned())
    }

    async fn find_vehicle(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Vehicle>> {
        Ok(self
            .lock()
            .vehicles
            .iter()
            .find(|v| v.id == id && v.organization_id == organization_id)
            .cloned())
    }

    async fn find_thread(&self, organization_id: Uuid, id: Uuid) -> Result<Option<EmailThread>> {
        Ok(self
            .lock()
            .threads
            .iter()
            .find(|t| t.id == id && t.organization_id == organization_id)
            .cloned())
    }

    async fn find_thread_by_external_id(
        &self,
        organization_id: Uuid,
        external_thread_id: &str,
    ) -> Result<Option<EmailThread>> {
        Ok(self
            .lock()
            .threads
            .iter()
            .find(|t| {
                t.organization_id == organization_id
                    && t.external_thread_id.as_deref() == Some(external_thread_id)
            })
            .cloned())
    }

    async fn find_legacy_thread(&self, quote_request_id: Uuid) -> Result<Option<EmailThread>> {
        Ok(self
            .lock()
            .threads
            .iter()
            .filter(|t| t.quote_request_id == Some(quote_request_id))
            .min_by_key(|t| t.created_at)
            .cloned())
    }

    async fn candidate_threads(&self, quote_request_id: Uuid) -> Result<Vec<EmailThread>> {
        let state = self.lock();
        let mut threads: Vec<EmailThread> = state
            .threads
            .iter()
            .filter(|t| {
                t.quote_request_id == Some(quote_request_id)
                    || state.links.iter().any(|l| {
                        l.email_thread_id == t.id && l.quote_request_id == quote_request_id
                    })
            })
            .cloned()
            .collect();
        threads.sort_by_key(|t| t.created_at);
        Ok(threads)
    }

    async fn thread_messages(&self, thread_id: Uuid) -> Result<Vec<EmailMessage>> {
        let mut messages = self.messages_for(thread_id);
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn first_message(&self, thread_id: Uuid) -> Result<Option<EmailMessage>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .min_by_key(|m| m.created_at)
            .cloned())
    }

    async fn earliest_outbound_recipient(&self, thread_id: Uuid) -> Result<Option<String>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id && m.direction == "OUTBOUND")
            .min_by_key(|m| m.created_at)
            .map(|m| m.to_address.clone()))
    }

    async fn earliest_inbound_at(&self, thread_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id && m.direction == "INBOUND")
            .map(|m| m.received_at.unwrap_or(m.created_at))
            .min())
    }

    async fn append_message(&self, thread_id: Uuid, message: NewEmailMessage<'_>) -> Result<()> {
        let message = owned_message(thread_id, message);
        self.lock().messages.push(message);
        Ok(())
    }

    async fn find_link(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>> {
        Ok(self
            .lock()
            .links
            .iter()
            .find(|l| l.quote_request_id == quote_request_id && l.supplier_id == supplier_id)
            .cloned())
    }

    async fn find_link_for_thread(
        &self,
        email_thread_id: Uuid,
    ) -> Result<Option<QuoteRequestEmailThread>> {
        Ok(self
            .lock()
            .links
            .iter()
            .find(|l| l.email_thread_id == email_thread_id)
            .cloned())
    }

    async fn links_for_request(
        &self,
        quote_request_id: Uuid,
    ) -> Result<Vec<QuoteRequestEmailThread>> {
        let mut links: Vec<QuoteRequestEmailThread> = self
            .lock()
            .links
            .iter()
            .filter(|l| l.quote_request_id == quote_request_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.created_at);
        Ok(links)
    }

    async fn mark_link_responded(
        &self,
        link_id: Uuid,
        response_date: DateTime<Utc>,
        quoted_amount: Option<Decimal>,
    ) -> Result<()> {
        let mut state = self.lock();
        if let Some(link) = state.links.iter_mut().find(|l| l.id == link_id) {
            link.status = ThreadLinkStatus::Responded.as_str().to_string();
            link.response_date = Some(link.response_date.unwrap_or(response_date));
            link.quoted_amount = quoted_amount.or(link.quoted_amount);
            link.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_links_for_request(&self, quote_request_id: Uuid) -> Result<u64> {
        let mut state = self.lock();
        let before = state.links.len();
        state.links.retain(|l| l.quote_request_id != quote_request_id);
        Ok((before - state.links.len()) as u64)
    }

    async fn link_thread(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        email_thread_id: Uuid,
        is_primary: bool,
    ) -> Result<LinkOutcome> {
        let mut state = self.lock();
        if state
            .links
            .iter()
            .any(|l| l.quote_request_id == quote_request_id && l.supplier_id == supplier_id)
        {
            return Ok(LinkOutcome::AlreadyLinked);
        }
        let link = new_link(quote_request_id, supplier_id, email_thread_id, is_primary);
        state.links.push(link.clone());
        Ok(LinkOutcome::Linked(link))
    }

    async fn record_outbound_send(&self, send: OutboundSend<'_>) -> Result<SendRecord> {
        let mut state = self.lock();
        if state.links.iter().any(|l| {
            l.quote_request_id == send.quote_request_id && l.supplier_id == send.supplier_id
        }) {
            return Ok(SendRecord::AlreadyLinked);
        }

        let link_directly = send.is_primary
            && !state
                .threads
                .iter()
                .any(|t| t.quote_request_id == Some(send.quote_request_id));

        let thread = EmailThread {
            id: Uuid::new_v4(),
            organization_id: send.organization_id,
            supplier_id: Some(send.supplier_id),
            quote_request_id: link_directly.then_some(send.quote_request_id),
            order_id: None,
            external_thread_id: send.external_thread_id.map(String::from),
            subject: Some(send.subject.to_string()),
            status: EmailThreadStatus::Sent.as_str().to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let thread_id = thread.id;
        let message = owned_message(thread_id, send.message);
        let link = new_link(
            send.quote_request_id,
            send.supplier_id,
            thread_id,
            send.is_primary,
        );
        state.threads.push(thread);
        state.messages.push(message);
        state.links.push(link);
        Ok(SendRecord::Created(thread_id))
    }

    async fn apply_inbound_reply(&self, reply: ReplyApplication<'_>) -> Result<usize> {
        let mut state = self.lock();
        let message = owned_message(reply.thread_id, reply.message);
        state.messages.push(message);

        let mut items_upserted = 0usize;
        if let Some(quote_request_id) = reply.quote_request_id {
            if let Some(supplier_id) = reply.supplier_id {
                for item in reply.items {
                    upsert_line(&mut state, quote_request_id, supplier_id, item);
                    items_upserted += 1;
                }
            }
            if let Some(total) = reply.total_amount {
                if let Some(quote) = state.quotes.iter_mut().find(|q| q.id == quote_request_id) {
                    quote.total_amount = Some(total);
                }
            }
            if let Some(status) = reply.quote_status {
                if let Some(quote) = state.quotes.iter_mut().find(|q| q.id == quote_request_id) {
                    quote.status = status.as_str().to_string();
                }
            }
        }

        if let Some(thread) = state.threads.iter_mut().find(|t| t.id == reply.thread_id) {
            thread.status = reply.thread_status.as_str().to_string();
            thread.updated_at = Utc::now();
        }

        if let Some(response) = reply.link_response {
            if let Some(link) = state.links.iter_mut().find(|l| l.id == response.link_id) {
                link.status = ThreadLinkStatus::Responded.as_str().to_string();
                link.response_date = Some(link.response_date.unwrap_or(response.received_at));
                link.quoted_amount = response.quoted_amount.or(link.quoted_amount);
            }
        }

        Ok(items_upserted)
    }

    async fn attach_orphan(
        &self,
        thread_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> Result<AttachOutcome> {
        let mut state = self.lock();

        let directly_assigned = !state
            .threads
            .iter()
            .any(|t| t.quote_request_id == Some(quote_request_id));
        if directly_assigned {
            if let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) {
                thread.quote_request_id = Some(quote_request_id);
                thread.updated_at = Utc::now();
            }
        }

        let mut junction_linked = false;
        if let Some(sid) = supplier_id {
            let exists = state
                .links
                .iter()
                .any(|l| l.quote_request_id == quote_request_id && l.supplier_id == sid);
            if !exists {
                let link = new_link(quote_request_id, sid, thread_id, false);
                state.links.push(link);
                junction_linked = true;
            }
        }

        Ok(AttachOutcome {
            directly_assigned,
            junction_linked,
        })
    }

    async fn merge_threads(&self, source: &EmailThread, target: &EmailThread) -> Result<u64> {
        let mut state = self.lock();

        let mut moved = 0u64;
        for message in state.messages.iter_mut() {
            if message.thread_id == source.id {
                message.thread_id = target.id;
                moved += 1;
            }
        }

        let adopt_quote = target.quote_request_id.is_none().then_some(source.quote_request_id).flatten();
        let adopt_external = if target.external_thread_id.is_none() {
            source.external_thread_id.clone()
        } else {
            None
        };
        if let Some(t) = state.threads.iter_mut().find(|t| t.id == target.id) {
            if let Some(qr) = adopt_quote {
                t.quote_request_id = Some(qr);
            }
            if t.external_thread_id.is_none() {
                t.external_thread_id = adopt_external;
            }
            t.updated_at = Utc::now();
        }

        state.threads.retain(|t| t.id != source.id);
        // The Postgres schema cascades the source's junction rows away.
        state.links.retain(|l| l.email_thread_id != source.id);
        Ok(moved)
    }

    async fn find_order(&self, organization_id: Uuid, id: Uuid) -> Result<Option<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .find(|o| o.id == id && o.organization_id == organization_id)
            .cloned())
    }

    async fn find_pending_order(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Order>> {
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|o| {
                o.organization_id == organization_id
                    && o.quote_request_id == Some(quote_request_id)
                    && o.supplier_id == Some(supplier_id)
                    && o.status == OrderStatus::PendingConfirmation.as_str()
            })
            .min_by_key(|o| o.created_at)
            .cloned())
    }

    async fn next_order_sequence(&self, organization_id: Uuid) -> Result<i64> {
        let count = self
            .lock()
            .orders
            .iter()
            .filter(|o| o.organization_id == organization_id)
            .count() as i64;
        Ok(count + 1)
    }

    async fn create_order(
        &self,
        order: NewOrder<'_>,
        lines: &[NewOrderLine<'_>],
    ) -> Result<Order> {
        let mut state = self.lock();
        if state.orders.iter().any(|o| {
            o.organization_id == order.organization_id && o.order_number == order.order_number
        }) {
            return Err(AppError::Conflict("Order number already exists".to_string()));
        }

        let created = Order {
            id: Uuid::new_v4(),
            organization_id: order.organization_id,
            order_number: order.order_number.to_string(),
            status: OrderStatus::PendingConfirmation.as_str().to_string(),
            supplier_id: Some(order.supplier_id),
            quote_request_id: Some(order.quote_request_id),
            fulfillment_method: order.fulfillment_method.as_str().to_string(),
            subtotal: order.subtotal,
            tax: order.tax,
            shipping: order.shipping,
            total: order.total,
            notes: order.notes.map(String::from),
            created_by: Some(order.created_by),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        for line in lines {
            state.order_items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id: created.id,
                part_id: Uuid::new_v4(),
                part_number: line.part_number.to_string(),
                description: line.description.map(String::from),
                quantity: line.quantity,
                unit_price: line.unit_price,
                fulfillment_method: order.fulfillment_method.as_str().to_string(),
                availability: line.availability.to_string(),
                expected_delivery: line.expected_delivery,
                created_at: Utc::now(),
            });
        }
        state.orders.push(created.clone());
        Ok(created)
    }

    async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        Ok(self.order_lines(order_id))
    }

    async fn finalize_conversion(
        &self,
        order_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        thread_id: Option<Uuid>,
    ) -> Result<()> {
        let mut state = self.lock();
        if let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) {
            order.status = OrderStatus::Confirmed.as_str().to_string();
            order.updated_at = Utc::now();
        }
        if let Some(quote) = state.quotes.iter_mut().find(|q| q.id == quote_request_id) {
            quote.status = QuoteRequestStatus::ConvertedToOrder.as_str().to_string();
            quote.selected_supplier_id = Some(supplier_id);
            quote.updated_at = Utc::now();
        }
        for link in state.links.iter_mut() {
            if link.quote_request_id == quote_request_id {
                link.status = if link.supplier_id == supplier_id {
                    ThreadLinkStatus::Accepted.as_str().to_string()
                } else {
                    ThreadLinkStatus::Rejected.as_str().to_string()
                };
                link.updated_at = Utc::now();
            }
        }
        if let Some(thread_id) = thread_id {
            if let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) {
                thread.order_id = Some(order_id);
                thread.status = EmailThreadStatus::ConvertedToOrder.as_str().to_string();
                thread.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn record_activity(&self, entry: ActivityEntry) {
        self.lock().activities.push(entry);
    }
}

// ---- fixture builders ----

pub fn organization(id: Uuid) -> Organization {
    Organization {
        id,
        name: "Harbour Freight Services".to_string(),
        contact_email: Some("fleet@harbourfreight.test".to_string()),
        contact_phone: None,
        address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn supplier(organization_id: Uuid, name: &str, email: &str) -> Supplier {
    Supplier {
        id: Uuid::new_v4(),
        organization_id,
        name: name.to_string(),
        email: Some(email.to_string()),
        aux_emails: Json(Vec::new()),
        phone: None,
        contact_person: None,
        address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn quote_request(
    organization_id: Uuid,
    supplier_id: Option<Uuid>,
    additional: &[Uuid],
    status: QuoteRequestStatus,
) -> QuoteRequest {
    QuoteRequest {
        id: Uuid::new_v4(),
        organization_id,
        vehicle_id: None,
        quote_number: "QR-03-2026-0001".to_string(),
        title: "Front brake overhaul".to_string(),
        status: status.as_str().to_string(),
        supplier_id,
        additional_supplier_ids: supplier_ids::encode(additional),
        selected_supplier_id: None,
        total_amount: None,
        notes: None,
        expiry_date: None,
        created_by: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn quote_line(quote_request_id: Uuid, part_number: &str, quantity: i32) -> QuoteRequestItem {
    QuoteRequestItem {
        id: Uuid::new_v4(),
        quote_request_id,
        supplier_id: None,
        part_number: part_number.to_string(),
        description: None,
        quantity,
        unit_price: None,
        availability: "UNKNOWN".to_string(),
        lead_time_days: None,
        is_alternative: false,
        superseded_by: None,
        supersedes: None,
        supersession_notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn priced_line(
    quote_request_id: Uuid,
    supplier_id: Uuid,
    part_number: &str,
    quantity: i32,
    unit_price: &str,
) -> QuoteRequestItem {
    let mut line = quote_line(quote_request_id, part_number, quantity);
    line.supplier_id = Some(supplier_id);
    line.unit_price = Some(unit_price.parse().unwrap());
    line
}

pub fn thread(
    organization_id: Uuid,
    supplier_id: Option<Uuid>,
    quote_request_id: Option<Uuid>,
    external_thread_id: Option<&str>,
    status: EmailThreadStatus,
) -> EmailThread {
    EmailThread {
        id: Uuid::new_v4(),
        organization_id,
        supplier_id,
        quote_request_id,
        order_id: None,
        external_thread_id: external_thread_id.map(String::from),
        subject: Some("RE: Quote request".to_string()),
        status: status.as_str().to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn link(
    quote_request_id: Uuid,
    supplier_id: Uuid,
    email_thread_id: Uuid,
    is_primary: bool,
) -> QuoteRequestEmailThread {
    new_link(quote_request_id, supplier_id, email_thread_id, is_primary)
}

pub fn message(
    thread_id: Uuid,
    direction: &str,
    from_address: &str,
    to_address: &str,
) -> EmailMessage {
    EmailMessage {
        id: Uuid::new_v4(),
        thread_id,
        direction: direction.to_string(),
        from_address: from_address.to_string(),
        to_address: to_address.to_string(),
        subject: None,
        body: Some("Thanks, quote attached.".to_string()),
        body_html: None,
        external_message_id: None,
        attachments: Json(Vec::new()),
        sent_at: None,
        received_at: Some(Utc::now()),
        created_at: Utc::now(),
    }
}
