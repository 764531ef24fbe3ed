/// Converts an approved quote request into a purchase order. Order rows are
/// written first; the quote only flips to CONVERTED_TO_ORDER once the
/// confirmation email has been accepted by the gateway (or the supplier has
/// no email on file), so a gateway failure leaves a retryable
/// PENDING_CONFIRMATION order and an untouched quote.
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::activity::ActivityEntry;
use crate::models::order::{ConvertToOrderRequest, Order, OrderResponse};
use crate::models::quote_request::{QuoteRequestItem, QuoteRequestStatus};
use crate::repositories::store::{NewOrder, NewOrderLine, ProcurementStore};
use crate::services::email_gateway::{
    EmailGateway, OrderConfirmationPayload, OrderEmailLine, OrganizationContact, SupplierContact,
};
use crate::services::numbering;

pub struct ConversionService {
    store: Arc<dyn ProcurementStore>,
    gateway: Arc<dyn EmailGateway>,
}

/// Sum of quantity x unit price over the given lines. Lines without a price
/// never reach this point (the supplier filter requires a price).
pub fn subtotal_of(items: &[QuoteRequestItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.unit_price.unwrap_or(Decimal::ZERO) * Decimal::from(item.quantity))
        .sum()
}

impl ConversionService {
    pub fn new(store: Arc<dyn ProcurementStore>, gateway: Arc<dyn EmailGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn convert(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        quote_request_id: Uuid,
        request: &ConvertToOrderRequest,
    ) -> Result<OrderResponse> {
        let quote = self
            .store
            .find_quote_request(organization_id, quote_request_id)
            .await?
            .ok_or(AppError::NotFound("Quote request not found".to_string()))?;

        if quote.status() != QuoteRequestStatus::Approved {
            return Err(AppError::InvalidState(format!(
                "Quote request in state {} cannot be converted",
                quote.status
            )));
        }

        let supplier_id = request
            .selected_supplier_id
            .or(quote.supplier_id)
            .ok_or(AppError::BadRequest("No supplier to convert with".to_string()))?;

        let supplier = self
            .store
            .find_supplier(organization_id, supplier_id)
            .await?
            .ok_or(AppError::NotFound("Supplier not found".to_string()))?;

        // Strict filter: only the chosen supplier's priced lines are costed
        // and copied, even when another supplier quoted the same part number.
        let items = self
            .store
            .quote_items_for_supplier(quote_request_id, supplier_id)
            .await?;
        if items.is_empty() {
            return Err(AppError::InvalidState(
                "Selected supplier has no priced lines on this quote request".to_string(),
            ));
        }

        let subtotal = subtotal_of(&items);
        let tax = request.tax.unwrap_or(Decimal::ZERO);
        let shipping = request.shipping.unwrap_or(Decimal::ZERO);
        let total = subtotal + tax + shipping;

        // A previous attempt may have created the order and then failed on
        // the confirmation email; reuse it rather than create a second one.
        let existing = self
            .store
            .find_pending_order(organization_id, quote_request_id, supplier_id)
            .await?;

        let order = match existing {
            Some(order) => order,
            None => {
                self.create_order_rows(
                    organization_id,
                    actor_id,
                    quote_request_id,
                    supplier_id,
                    request,
                    &items,
                    subtotal,
                    tax,
                    shipping,
                    total,
                )
                .await?
            }
        };

        // Confirmation email outside any store write; failure here leaves
        // the pending order and the approved quote exactly as they are.
        if let Some(supplier_email) = supplier.email.clone() {
            let organization = self
                .store
                .find_organization(organization_id)
                .await?
                .ok_or(AppError::NotFound("Organization not found".to_string()))?;

            let payload = OrderConfirmationPayload {
                order_number: order.order_number.clone(),
                quote_number: Some(quote.quote_number.clone()),
                supplier: SupplierContact {
                    name: supplier.name.clone(),
                    email: supplier_email,
                    contact_person: supplier.contact_person.clone(),
                },
                organization: OrganizationContact {
                    name: organization.name,
                    email: organization.contact_email,
                    phone: organization.contact_phone,
                },
                fulfillment_method: request.fulfillment_method.as_str().to_string(),
                items: items
                    .iter()
                    .map(|item| OrderEmailLine {
                        part_number: item.part_number.clone(),
                        description: item.description.clone(),
                        quantity: item.quantity,
                        unit_price: item.unit_price.unwrap_or(Decimal::ZERO),
                    })
                    .collect(),
                subtotal,
                tax,
                shipping,
                total,
                notes: request.notes.clone(),
            };

            self.gateway.generate_order_confirmation_email(&payload).await?;
        } else {
            tracing::info!(
                "Supplier {} has no email on file; converting order {} without confirmation",
                supplier.id,
                order.order_number
            );
        }

        // Settle everything in one pass now that the gate has passed.
        let thread_id = self.resolve_thread(quote_request_id, supplier_id).await?;
        self.store
            .finalize_conversion(order.id, quote_request_id, supplier_id, thread_id)
            .await?;

        self.store
            .record_activity(
                ActivityEntry::new(
                    organization_id,
                    "quote_request_converted",
                    format!("Quote request {} converted to order {}", quote.quote_number, order.order_number),
                )
                .entity("order", order.id)
                .actor(actor_id)
                .metadata(serde_json::json!({
                    "supplier_id": supplier_id,
                    "total": total,
                })),
            )
            .await;

        let order_items = self.store.order_items(order.id).await?;
        let mut response: OrderResponse = self
            .store
            .find_order(organization_id, order.id)
            .await?
            .ok_or(AppError::NotFound("Order not found".to_string()))?
            .into();
        response.items = Some(order_items);
        Ok(response)
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_order_rows(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Uuid,
        request: &ConvertToOrderRequest,
        items: &[QuoteRequestItem],
        subtotal: Decimal,
        tax: Decimal,
        shipping: Decimal,
        total: Decimal,
    ) -> Result<Order> {
        let today = Utc::now().date_naive();
        let mut sequence = self.store.next_order_sequence(organization_id).await?;

        let lines: Vec<NewOrderLine<'_>> = items
            .iter()
            .map(|item| NewOrderLine {
                part_number: &item.part_number,
                description: item.description.as_deref(),
                quantity: item.quantity,
                unit_price: item.unit_price.unwrap_or(Decimal::ZERO),
                availability: &item.availability,
                expected_delivery: item
                    .lead_time_days
                    .map(|days| today + Duration::days(days as i64)),
                superseded_by: item.superseded_by.as_deref(),
                supersedes: item.supersedes.as_deref(),
                supersession_notes: item.supersession_notes.as_deref(),
            })
            .collect();

        // The unique constraint on (organization, order_number) turns a
        // concurrent collision into a Conflict; retry once with the next
        // sequence value.
        for attempt in 0..2 {
            let order_number = numbering::format_order_number(today, sequence);
            let created = self
                .store
                .create_order(
                    NewOrder {
                        organization_id,
                        order_number: &order_number,
                        supplier_id,
                        quote_request_id,
                        fulfillment_method: request.fulfillment_method,
                        subtotal,
                        tax,
                        shipping,
                        total,
                        notes: request.notes.as_deref(),
                        created_by: actor_id,
                    },
                    &lines,
                )
                .await;

            match created {
                Ok(order) => return Ok(order),
                Err(AppError::Conflict(_)) if attempt == 0 => {
                    sequence += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict("Could not allocate order number".to_string()))
    }

    /// The order's thread: the chosen supplier's junction link first, the
    /// legacy singular association as fallback.
    async fn resolve_thread(
        &self,
        quote_request_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<Option<Uuid>> {
        if let Some(link) = self.store.find_link(quote_request_id, supplier_id).await? {
            return Ok(Some(link.email_thread_id));
        }
        Ok(self
            .store
            .find_legacy_thread(quote_request_id)
            .await?
            .map(|t| t.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::email_thread::{EmailThreadStatus, ThreadLinkStatus};
    use crate::models::order::{FulfillmentMethod, OrderStatus};
    use crate::repositories::memory_store::{self, link, thread, MemoryStore};
    use crate::services::email_gateway::stubs::CannedGateway;

    fn line(supplier: Option<Uuid>, qty: i32, price: Option<&str>) -> QuoteRequestItem {
        QuoteRequestItem {
            id: Uuid::new_v4(),
            quote_request_id: Uuid::new_v4(),
            supplier_id: supplier,
            part_number: "BP-1044".to_string(),
            description: None,
            quantity: qty,
            unit_price: price.map(|p| p.parse().unwrap()),
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

    #[test]
    fn subtotal_multiplies_quantity_by_price() {
        let supplier = Uuid::new_v4();
        let items = vec![
            line(Some(supplier), 2, Some("45.00")),
            line(Some(supplier), 1, Some("120.50")),
        ];
        assert_eq!(subtotal_of(&items), "210.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn subtotal_of_empty_is_zero() {
        assert_eq!(subtotal_of(&[]), Decimal::ZERO);
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        organization_id: Uuid,
        supplier_id: Uuid,
        quote_request_id: Uuid,
    }

    fn approved_fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let organization_id = Uuid::new_v4();
        store.add_organization(memory_store::organization(organization_id));

        let supplier = memory_store::supplier(organization_id, "Nordparts", "sales@nordparts.test");
        let supplier_id = supplier.id;
        store.add_supplier(supplier);

        let quote = memory_store::quote_request(
            organization_id,
            Some(supplier_id),
            &[],
            QuoteRequestStatus::Approved,
        );
        let quote_request_id = quote.id;
        store.add_quote_request(quote);
        store.add_quote_item(memory_store::priced_line(
            quote_request_id,
            supplier_id,
            "BP-1044",
            2,
            "45.00",
        ));

        let t = thread(
            organization_id,
            Some(supplier_id),
            Some(quote_request_id),
            Some("ext-100"),
            EmailThreadStatus::ResponseReceived,
        );
        let thread_id = t.id;
        store.add_thread(t);
        store.add_link(link(quote_request_id, supplier_id, thread_id, true));

        Fixture {
            store,
            organization_id,
            supplier_id,
            quote_request_id,
        }
    }

    fn convert_request() -> ConvertToOrderRequest {
        ConvertToOrderRequest {
            fulfillment_method: FulfillmentMethod::Delivery,
            selected_supplier_id: None,
            tax: None,
            shipping: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn convert_rejects_unapproved_quote_without_creating_an_order() {
        let f = approved_fixture();
        f.store
            .update_quote_status(f.quote_request_id, QuoteRequestStatus::UnderReview)
            .await
            .unwrap();

        let service = ConversionService::new(f.store.clone(), Arc::new(CannedGateway::new()));
        let err = service
            .convert(
                f.organization_id,
                Uuid::new_v4(),
                f.quote_request_id,
                &convert_request(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(f.store.orders().is_empty());
    }

    #[tokio::test]
    async fn successful_conversion_settles_quote_links_and_thread() {
        let f = approved_fixture();
        let service = ConversionService::new(f.store.clone(), Arc::new(CannedGateway::new()));

        let response = service
            .convert(
                f.organization_id,
                Uuid::new_v4(),
                f.quote_request_id,
                &convert_request(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, OrderStatus::Confirmed.as_str());
        assert_eq!(response.subtotal, "90.00".parse::<Decimal>().unwrap());
        assert_eq!(response.items.as_ref().unwrap().len(), 1);

        let quote = f.store.quote(f.quote_request_id);
        assert_eq!(quote.status(), QuoteRequestStatus::ConvertedToOrder);
        assert_eq!(quote.selected_supplier_id, Some(f.supplier_id));

        let links = f.store.links();
        assert!(links
            .iter()
            .all(|l| l.status == ThreadLinkStatus::Accepted.as_str()
                || l.supplier_id != f.supplier_id));

        let threads = f.store.threads();
        let converted = threads
            .iter()
            .find(|t| t.quote_request_id == Some(f.quote_request_id))
            .unwrap();
        assert_eq!(converted.status, EmailThreadStatus::ConvertedToOrder.as_str());
        assert_eq!(converted.order_id, Some(response.id));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_a_retryable_pending_order() {
        let f = approved_fixture();
        let failing = ConversionService::new(
            f.store.clone(),
            Arc::new(CannedGateway::failing_confirmations()),
        );

        let err = failing
            .convert(
                f.organization_id,
                Uuid::new_v4(),
                f.quote_request_id,
                &convert_request(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalGateway(_)));

        // Order rows exist but nothing was settled.
        let orders = f.store.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::PendingConfirmation.as_str());
        assert_eq!(
            f.store.quote(f.quote_request_id).status(),
            QuoteRequestStatus::Approved
        );

        // The retry reuses the pending order instead of numbering a new one.
        let retry = ConversionService::new(f.store.clone(), Arc::new(CannedGateway::new()));
        let response = retry
            .convert(
                f.organization_id,
                Uuid::new_v4(),
                f.quote_request_id,
                &convert_request(),
            )
            .await
            .unwrap();

        assert_eq!(f.store.orders().len(), 1);
        assert_eq!(response.id, orders[0].id);
        assert_eq!(response.status, OrderStatus::Confirmed.as_str());
        assert_eq!(
            f.store.quote(f.quote_request_id).status(),
            QuoteRequestStatus::ConvertedToOrder
        );
    }

    #[tokio::test]
    async fn conversion_copies_only_the_selected_suppliers_lines() {
        let f = approved_fixture();
        let rival = memory_store::supplier(f.organization_id, "Baltic Auto", "quotes@balticauto.test");
        let rival_id = rival.id;
        f.store.add_supplier(rival);
        f.store.add_quote_item(memory_store::priced_line(
            f.quote_request_id,
            rival_id,
            "BP-1044",
            2,
            "39.00",
        ));

        let service = ConversionService::new(f.store.clone(), Arc::new(CannedGateway::new()));
        let response = service
            .convert(
                f.organization_id,
                Uuid::new_v4(),
                f.quote_request_id,
                &convert_request(),
            )
            .await
            .unwrap();

        // Primary supplier's price, not the rival's cheaper line.
        assert_eq!(response.subtotal, "90.00".parse::<Decimal>().unwrap());
        let items = response.items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, "45.00".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn convert_requires_priced_lines_for_the_selected_supplier() {
        let f = approved_fixture();
        let other = memory_store::supplier(f.organization_id, "Baltic Auto", "quotes@balticauto.test");
        let other_id = other.id;
        f.store.add_supplier(other);

        let service = ConversionService::new(f.store.clone(), Arc::new(CannedGateway::new()));
        let mut request = convert_request();
        request.selected_supplier_id = Some(other_id);

        let err = service
            .convert(f.organization_id, Uuid::new_v4(), f.quote_request_id, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(f.store.orders().is_empty());
    }
}
