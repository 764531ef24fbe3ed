/// Quote lifecycle engine: drives quote requests through
/// DRAFT → SENT → RECEIVED/UNDER_REVIEW → APPROVED → CONVERTED_TO_ORDER,
/// fans sends out to every supplier on the request, and reconciles inbound
/// replies into thread and line-item state.
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::activity::ActivityEntry;
use crate::models::email_thread::{EmailThreadStatus, MessageDirection, QuoteRequestEmailThread, ThreadLinkStatus};
use crate::models::quote_request::{QuoteRequest, QuoteRequestStatus};
use crate::models::supplier::Supplier;
use crate::models::webhook::{self, ExtractedQuoteData, InboundEmailPayload};
use crate::repositories::email_thread_repo::NewEmailMessage;
use crate::repositories::store::{
    LinkResponse, OutboundSend, ProcurementStore, ReplyApplication, SendRecord,
};
use crate::services::email_gateway::{
    EmailGateway, OrganizationContact, QuoteEmailLine, QuoteRequestEmailPayload, SupplierContact,
    VehicleContext,
};

const FALLBACK_FROM_ADDRESS: &str = "procurement@fleetdesk.local";

#[derive(Debug, Serialize)]
pub struct SupplierSendOutcome {
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub sent: bool,
    pub already_linked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendSummary {
    pub quote_request_id: Uuid,
    pub status: String,
    pub total_sent: usize,
    pub results: Vec<SupplierSendOutcome>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileOutcome {
    pub thread_id: Uuid,
    pub classification: &'static str,
    pub items_upserted: usize,
}

#[derive(Debug, Serialize)]
pub struct ThreadStatusPromotion {
    pub promoted: Vec<Uuid>,
    pub unchanged: usize,
}

/// Per-supplier reply status, the read side of the two-phase send protocol:
/// `send` returns after dispatch and callers poll this instead of blocking.
#[derive(Debug, Serialize)]
pub struct SupplierReplyStatus {
    pub supplier_id: Uuid,
    pub email_thread_id: Uuid,
    pub status: String,
    pub is_primary: bool,
    pub quoted_amount: Option<rust_decimal::Decimal>,
    pub response_date: Option<chrono::DateTime<Utc>>,
}

pub struct QuoteLifecycleService {
    store: Arc<dyn ProcurementStore>,
    /// Absent for callers whose operations never leave the database.
    gateway: Option<Arc<dyn EmailGateway>>,
}

impl QuoteLifecycleService {
    pub fn new(store: Arc<dyn ProcurementStore>, gateway: Arc<dyn EmailGateway>) -> Self {
        Self {
            store,
            gateway: Some(gateway),
        }
    }

    pub fn without_gateway(store: Arc<dyn ProcurementStore>) -> Self {
        Self {
            store,
            gateway: None,
        }
    }

    fn gateway(&self) -> Result<&dyn EmailGateway> {
        self.gateway
            .as_deref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("email gateway not configured")))
    }

    async fn load_request(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<QuoteRequest> {
        self.store
            .find_quote_request(organization_id, quote_request_id)
            .await?
            .ok_or(AppError::NotFound("Quote request not found".to_string()))
    }

    /// Sends the RFQ to the primary plus additional suppliers. Each supplier
    /// is handled independently: one failure never blocks the next, and the
    /// aggregate succeeds when at least one send went out.
    pub async fn send(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<SendSummary> {
        let request = self.load_request(organization_id, quote_request_id).await?;

        let status = request.status();
        if !matches!(status, QuoteRequestStatus::Draft | QuoteRequestStatus::Sent) {
            return Err(AppError::InvalidState(format!(
                "Quote request in state {} cannot be sent",
                request.status
            )));
        }

        let supplier_ids = request.supplier_set();
        if supplier_ids.is_empty() {
            return Err(AppError::BadRequest("No suppliers on quote request".to_string()));
        }

        let suppliers = self
            .store
            .suppliers_by_ids(organization_id, &supplier_ids)
            .await?;
        let items = self.store.quote_items(quote_request_id).await?;

        let organization = self
            .store
            .find_organization(organization_id)
            .await?
            .ok_or(AppError::NotFound("Organization not found".to_string()))?;

        let vehicle = match request.vehicle_id {
            Some(vehicle_id) => self.store.find_vehicle(organization_id, vehicle_id).await?,
            None => None,
        };

        let lines: Vec<QuoteEmailLine> = items
            .iter()
            .map(|item| QuoteEmailLine {
                part_number: item.part_number.clone(),
                description: item.description.clone(),
                quantity: item.quantity,
            })
            .collect();

        let mut results = Vec::new();
        let mut total_sent = 0usize;

        // Preserve the request's supplier ordering, not the query's.
        for supplier_id in &supplier_ids {
            let supplier = match suppliers.iter().find(|s| s.id == *supplier_id) {
                Some(s) => s,
                None => {
                    results.push(SupplierSendOutcome {
                        supplier_id: *supplier_id,
                        supplier_name: String::new(),
                        sent: false,
                        already_linked: false,
                        error: Some("Supplier not found in organization".to_string()),
                    });
                    continue;
                }
            };

            let is_primary = request.supplier_id == Some(supplier.id);
            match self
                .send_to_supplier(&request, supplier, is_primary, &organization, &vehicle, &lines)
                .await
            {
                Ok(SendToSupplier::Sent) => {
                    total_sent += 1;
                    results.push(SupplierSendOutcome {
                        supplier_id: supplier.id,
                        supplier_name: supplier.name.clone(),
                        sent: true,
                        already_linked: false,
                        error: None,
                    });
                }
                Ok(SendToSupplier::AlreadyLinked) => {
                    results.push(SupplierSendOutcome {
                        supplier_id: supplier.id,
                        supplier_name: supplier.name.clone(),
                        sent: false,
                        already_linked: true,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "RFQ send failed for supplier {} on quote {}: {}",
                        supplier.id,
                        request.quote_number,
                        e
                    );
                    results.push(SupplierSendOutcome {
                        supplier_id: supplier.id,
                        supplier_name: supplier.name.clone(),
                        sent: false,
                        already_linked: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let mut final_status = request.status.clone();
        if total_sent > 0 && status == QuoteRequestStatus::Draft {
            self.store
                .update_quote_status(quote_request_id, QuoteRequestStatus::Sent)
                .await?;
            final_status = QuoteRequestStatus::Sent.as_str().to_string();

            self.store
                .record_activity(
                    ActivityEntry::new(organization_id, "quote_request_sent", format!(
                        "Quote request {} sent to {} supplier(s)",
                        request.quote_number, total_sent
                    ))
                    .entity("quote_request", quote_request_id)
                    .actor(actor_id),
                )
                .await;
        }

        Ok(SendSummary {
            quote_request_id,
            status: final_status,
            total_sent,
            results,
        })
    }

    async fn send_to_supplier(
        &self,
        request: &QuoteRequest,
        supplier: &Supplier,
        is_primary: bool,
        organization: &crate::models::user::Organization,
        vehicle: &Option<crate::models::vehicle::Vehicle>,
        lines: &[QuoteEmailLine],
    ) -> Result<SendToSupplier> {
        // Idempotency: an existing link means this supplier was already sent
        // to; leave it untouched.
        if self
            .store
            .find_link(request.id, supplier.id)
            .await?
            .is_some()
        {
            return Ok(SendToSupplier::AlreadyLinked);
        }

        let supplier_email = supplier
            .email
            .clone()
            .ok_or(AppError::BadRequest("Supplier has no email on file".to_string()))?;

        let payload = QuoteRequestEmailPayload {
            quote_number: request.quote_number.clone(),
            title: request.title.clone(),
            supplier: SupplierContact {
                name: supplier.name.clone(),
                email: supplier_email.clone(),
                contact_person: supplier.contact_person.clone(),
            },
            organization: OrganizationContact {
                name: organization.name.clone(),
                email: organization.contact_email.clone(),
                phone: organization.contact_phone.clone(),
            },
            vehicle: vehicle.as_ref().map(|v| VehicleContext {
                registration: v.registration.clone(),
                make: v.make.clone(),
                model: v.model.clone(),
                year: v.year,
                vin: v.vin.clone(),
            }),
            items: lines.to_vec(),
            expiry_date: request.expiry_date,
            notes: request.notes.clone(),
        };

        // The external call stays outside the store write: rows are only
        // written once the gateway has accepted the send.
        let generated = self.gateway()?.generate_quote_request_email(&payload).await?;

        let from_address = organization
            .contact_email
            .clone()
            .unwrap_or_else(|| FALLBACK_FROM_ADDRESS.to_string());

        let record = self
            .store
            .record_outbound_send(OutboundSend {
                organization_id: request.organization_id,
                quote_request_id: request.id,
                supplier_id: supplier.id,
                is_primary,
                external_thread_id: generated.external_thread_id.as_deref(),
                subject: &generated.subject,
                message: NewEmailMessage {
                    direction: MessageDirection::Outbound,
                    from_address: &from_address,
                    to_address: &supplier_email,
                    subject: Some(&generated.subject),
                    body: Some(&generated.body),
                    body_html: generated.body_html.as_deref(),
                    external_message_id: Some(&generated.message_id),
                    attachments: Vec::new(),
                    sent_at: Some(Utc::now()),
                    received_at: None,
                },
            })
            .await?;

        Ok(match record {
            SendRecord::Created(_) => SendToSupplier::Sent,
            SendRecord::AlreadyLinked => SendToSupplier::AlreadyLinked,
        })
    }

    /// Entry point for the inbound-parse webhook. Appends the reply to its
    /// thread and either upserts extracted pricing (UNDER_REVIEW) or records
    /// a bare acknowledgment (RECEIVED).
    pub async fn reconcile_inbound_reply(
        &self,
        organization_id: Uuid,
        payload: &InboundEmailPayload,
    ) -> Result<ReconcileOutcome> {
        let thread = self
            .store
            .find_thread_by_external_id(organization_id, &payload.external_thread_id)
            .await?
            .ok_or(AppError::NotFound("Email thread not found".to_string()))?;

        let received_at = payload.received_at.unwrap_or_else(Utc::now);

        // Replies on converted threads become order correspondence; the
        // quote's state is settled and must not move.
        if thread.status() == EmailThreadStatus::ConvertedToOrder {
            self.store
                .append_message(thread.id, Self::inbound_message(payload, received_at))
                .await?;

            self.store
                .record_activity(
                    ActivityEntry::new(
                        organization_id,
                        "order_correspondence_received",
                        format!("Reply received on converted thread from {}", payload.from_address),
                    )
                    .entity("email_thread", thread.id),
                )
                .await;

            return Ok(ReconcileOutcome {
                thread_id: thread.id,
                classification: "order_correspondence",
                items_upserted: 0,
            });
        }

        let link = self.store.find_link_for_thread(thread.id).await?;
        let supplier_id = link.as_ref().map(|l| l.supplier_id).or(thread.supplier_id);
        // The junction link is authoritative; the singular column only
        // covers threads that were never fanned out.
        let quote_request_id = link
            .as_ref()
            .map(|l| l.quote_request_id)
            .or(thread.quote_request_id);
        let has_pricing = payload.has_structured_pricing();

        let mut quote_status = None;
        if let Some(quote_request_id) = quote_request_id {
            let request = self.load_request(organization_id, quote_request_id).await?;
            let current = request.status();
            if has_pricing {
                // A priced reply pulls even an approved request back for
                // review; the transition table is the only gate.
                if current.can_transition_to(QuoteRequestStatus::UnderReview) {
                    quote_status = Some(QuoteRequestStatus::UnderReview);
                }
            } else if current.can_transition_to(QuoteRequestStatus::Received) {
                quote_status = Some(QuoteRequestStatus::Received);
            }
        }

        let link_response = link.as_ref().and_then(|l| {
            (!l.status().is_terminal()).then(|| LinkResponse {
                link_id: l.id,
                received_at,
                quoted_amount: payload.extracted_data.total_amount,
            })
        });

        let items_upserted = self
            .store
            .apply_inbound_reply(ReplyApplication {
                thread_id: thread.id,
                message: Self::inbound_message(payload, received_at),
                quote_request_id,
                supplier_id,
                items: if has_pricing {
                    &payload.extracted_data.quote_items
                } else {
                    &[]
                },
                total_amount: if has_pricing {
                    payload.extracted_data.total_amount
                } else {
                    None
                },
                quote_status,
                thread_status: EmailThreadStatus::ResponseReceived,
                link_response,
            })
            .await?;

        self.store
            .record_activity(
                ActivityEntry::new(
                    organization_id,
                    "supplier_reply_received",
                    format!("Reply from {} ({} line(s) extracted)", payload.from_address, items_upserted),
                )
                .entity("email_thread", thread.id),
            )
            .await;

        Ok(ReconcileOutcome {
            thread_id: thread.id,
            classification: if has_pricing { "priced" } else { "acknowledgment" },
            items_upserted,
        })
    }

    fn inbound_message(payload: &InboundEmailPayload, received_at: chrono::DateTime<Utc>) -> NewEmailMessage<'_> {
        NewEmailMessage {
            direction: MessageDirection::Inbound,
            from_address: &payload.from_address,
            to_address: &payload.to_address,
            subject: payload.subject.as_deref(),
            body: payload.body.as_deref(),
            body_html: payload.body_html.as_deref(),
            external_message_id: payload.external_message_id.as_deref(),
            attachments: payload.attachments.clone(),
            sent_at: None,
            received_at: Some(received_at),
        }
    }

    /// Promotes SENT junction rows whose threads have received at least one
    /// inbound message, stamping response_date from the earliest such
    /// message. ACCEPTED/REJECTED rows are terminal for this pass.
    pub async fn update_thread_statuses(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<ThreadStatusPromotion> {
        self.load_request(organization_id, quote_request_id).await?;
        let links = self.store.links_for_request(quote_request_id).await?;

        let mut promoted = Vec::new();
        let mut unchanged = 0usize;

        for link in links {
            if link.status() != ThreadLinkStatus::Sent {
                unchanged += 1;
                continue;
            }
            match self.store.earliest_inbound_at(link.email_thread_id).await? {
                Some(first_inbound) => {
                    self.store
                        .mark_link_responded(link.id, first_inbound, None)
                        .await?;
                    promoted.push(link.supplier_id);
                }
                None => unchanged += 1,
            }
        }

        Ok(ThreadStatusPromotion { promoted, unchanged })
    }

    /// Read side of the two-phase protocol: per-supplier link status for
    /// callers polling for replies.
    pub async fn reply_status(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<Vec<SupplierReplyStatus>> {
        self.load_request(organization_id, quote_request_id).await?;
        let links = self.store.links_for_request(quote_request_id).await?;
        Ok(links.into_iter().map(Self::link_to_status).collect())
    }

    fn link_to_status(link: QuoteRequestEmailThread) -> SupplierReplyStatus {
        SupplierReplyStatus {
            supplier_id: link.supplier_id,
            email_thread_id: link.email_thread_id,
            status: link.status,
            is_primary: link.is_primary,
            quoted_amount: link.quoted_amount,
            response_date: link.response_date,
        }
    }

    pub async fn approve(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<QuoteRequest> {
        self.transition(organization_id, actor_id, quote_request_id, QuoteRequestStatus::Approved)
            .await
    }

    pub async fn cancel(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<QuoteRequest> {
        self.transition(organization_id, actor_id, quote_request_id, QuoteRequestStatus::Cancelled)
            .await
    }

    /// Revision flow: pull an approved request back for review.
    pub async fn reopen_review(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        quote_request_id: Uuid,
    ) -> Result<QuoteRequest> {
        self.transition(
            organization_id,
            actor_id,
            quote_request_id,
            QuoteRequestStatus::UnderReview,
        )
        .await
    }

    async fn transition(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        quote_request_id: Uuid,
        next: QuoteRequestStatus,
    ) -> Result<QuoteRequest> {
        let request = self.load_request(organization_id, quote_request_id).await?;
        if !request.status().can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "Cannot move quote request from {} to {}",
                request.status,
                next.as_str()
            )));
        }

        self.store.update_quote_status(quote_request_id, next).await?;

        self.store
            .record_activity(
                ActivityEntry::new(
                    organization_id,
                    "quote_request_status_changed",
                    format!("Quote request {} moved to {}", request.quote_number, next.as_str()),
                )
                .entity("quote_request", quote_request_id)
                .actor(actor_id),
            )
            .await;

        self.load_request(organization_id, quote_request_id).await
    }

    /// On-demand re-parse of a thread's latest inbound message through the
    /// gateway, feeding the extraction through the same upsert path the
    /// webhook uses.
    pub async fn reparse_thread(
        &self,
        organization_id: Uuid,
        thread_id: Uuid,
    ) -> Result<ReconcileOutcome> {
        let thread = self
            .store
            .find_thread(organization_id, thread_id)
            .await?
            .ok_or(AppError::NotFound("Email thread not found".to_string()))?;

        let messages = self.store.thread_messages(thread_id).await?;
        let latest_inbound = messages
            .iter()
            .rev()
            .find(|m| m.direction == "INBOUND")
            .ok_or(AppError::BadRequest("Thread has no inbound messages".to_string()))?;

        let body = latest_inbound
            .body
            .clone()
            .or_else(|| latest_inbound.body_html.clone())
            .ok_or(AppError::BadRequest("Message has no body to parse".to_string()))?;

        let parsed = self
            .gateway()?
            .parse_email(&crate::services::email_gateway::ParseEmailPayload {
                subject: latest_inbound.subject.clone(),
                body,
                supplier_name: None,
            })
            .await?;

        let link = self.store.find_link_for_thread(thread.id).await?;
        let quote_request_id = link
            .as_ref()
            .map(|l| l.quote_request_id)
            .or(thread.quote_request_id)
            .ok_or(AppError::BadRequest("Thread is not linked to a quote request".to_string()))?;
        let supplier_id = link
            .as_ref()
            .map(|l| l.supplier_id)
            .or(thread.supplier_id)
            .ok_or(AppError::BadRequest("Thread has no supplier".to_string()))?;

        if !webhook::has_structured_pricing(&parsed.extracted_data, parsed.confidence) {
            return Ok(ReconcileOutcome {
                thread_id,
                classification: "acknowledgment",
                items_upserted: 0,
            });
        }

        let items_upserted = self
            .apply_extracted(quote_request_id, supplier_id, &parsed.extracted_data)
            .await?;

        Ok(ReconcileOutcome {
            thread_id,
            classification: "priced",
            items_upserted,
        })
    }

    async fn apply_extracted(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        data: &ExtractedQuoteData,
    ) -> Result<usize> {
        self.store
            .apply_extraction(
                quote_request_id,
                supplier_id,
                &data.quote_items,
                data.total_amount,
            )
            .await
    }
}

enum SendToSupplier {
    Sent,
    AlreadyLinked,
}
