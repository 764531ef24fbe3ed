/// Repairs the association between email threads and quote requests: manual
/// orphan assignment, thread merging, and the bulk re-link pass that matches
/// outbound recipients back to supplier addresses.
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::activity::ActivityEntry;
use crate::models::email_thread::{EmailThread, QuoteRequestEmailThread};
use crate::models::supplier::Supplier;
use crate::repositories::store::{LinkOutcome, ProcurementStore};

pub struct ThreadReconciliationService {
    store: Arc<dyn ProcurementStore>,
}

#[derive(Debug, Serialize)]
pub struct AssignOutcome {
    pub thread_id: Uuid,
    pub quote_request_id: Uuid,
    /// Set when the assignment collapsed into an existing thread instead.
    pub merged_into: Option<Uuid>,
    /// Reply address recorded as a new auxiliary address on the supplier.
    pub learned_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncThreadOutcome {
    pub thread_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub outcome: String,
}

#[derive(Debug, Serialize)]
pub struct SyncSummary {
    pub linked: usize,
    pub already_linked: usize,
    pub unmatched: usize,
    pub errors: usize,
    pub threads: Vec<SyncThreadOutcome>,
}

impl ThreadReconciliationService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Attaches an orphaned thread to a quote request. When the thread's
    /// reply came from an address the supplier is not known by, the address
    /// is recorded as an auxiliary so future webhooks match automatically.
    /// If the request already has a thread for the same supplier, the orphan
    /// is merged into it instead of creating a duplicate link.
    pub async fn assign_orphan(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        thread_id: Uuid,
        quote_request_id: Uuid,
        supplier_id: Option<Uuid>,
    ) -> Result<AssignOutcome> {
        let thread = self
            .store
            .find_thread(organization_id, thread_id)
            .await?
            .ok_or(AppError::NotFound("Email thread not found".to_string()))?;
        // Junction-linked threads are not orphans either, even when their
        // singular column is empty.
        if !thread.is_orphaned()
            || self.store.find_link_for_thread(thread_id).await?.is_some()
        {
            return Err(AppError::InvalidState(
                "Thread is already linked to a quote request".to_string(),
            ));
        }

        let quote = self
            .store
            .find_quote_request(organization_id, quote_request_id)
            .await?
            .ok_or(AppError::NotFound("Quote request not found".to_string()))?;

        let supplier_id = supplier_id.or(thread.supplier_id).or(quote.supplier_id);
        let learned_address = match supplier_id {
            Some(sid) => self.learn_reply_address(organization_id, sid, &thread).await?,
            None => None,
        };

        if let Some(sid) = supplier_id {
            if let Some(link) = self.store.find_link(quote_request_id, sid).await? {
                if link.email_thread_id != thread_id {
                    let merged = self
                        .merge(organization_id, actor_id, thread_id, link.email_thread_id)
                        .await?;
                    return Ok(AssignOutcome {
                        thread_id,
                        quote_request_id,
                        merged_into: Some(merged.id),
                        learned_address,
                    });
                }
            }
        }

        self.store
            .attach_orphan(thread_id, quote_request_id, supplier_id)
            .await?;

        self.store
            .record_activity(
                ActivityEntry::new(
                    organization_id,
                    "thread_assigned",
                    format!("Orphaned email thread linked to quote request {}", quote.quote_number),
                )
                .entity("email_thread", thread_id)
                .actor(actor_id),
            )
            .await;

        Ok(AssignOutcome {
            thread_id,
            quote_request_id,
            merged_into: None,
            learned_address,
        })
    }

    /// Folds the source thread into the target: messages move over, the
    /// target adopts whatever association data it lacks, and the source row
    /// is deleted. Merging an already-merged source yields NotFound.
    pub async fn merge(
        &self,
        organization_id: Uuid,
        actor_id: Uuid,
        source_id: Uuid,
        target_id: Uuid,
    ) -> Result<EmailThread> {
        if source_id == target_id {
            return Err(AppError::BadRequest(
                "Cannot merge a thread into itself".to_string(),
            ));
        }
        let source = self
            .store
            .find_thread(organization_id, source_id)
            .await?
            .ok_or(AppError::NotFound("Source thread not found".to_string()))?;
        let target = self
            .store
            .find_thread(organization_id, target_id)
            .await?
            .ok_or(AppError::NotFound("Target thread not found".to_string()))?;

        let moved = self.store.merge_threads(&source, &target).await?;

        self.store
            .record_activity(
                ActivityEntry::new(
                    organization_id,
                    "threads_merged",
                    format!("Email thread merged ({} messages moved)", moved),
                )
                .entity("email_thread", target_id)
                .actor(actor_id)
                .metadata(serde_json::json!({ "source_thread_id": source_id })),
            )
            .await;

        self.store
            .find_thread(organization_id, target_id)
            .await?
            .ok_or(AppError::NotFound("Target thread not found".to_string()))
    }

    /// Rebuilds the per-supplier junction links for a quote request by
    /// matching each thread's earliest outbound recipient against the known
    /// supplier addresses. With `force_resync`, existing links are dropped
    /// first so stale associations do not survive a supplier edit.
    pub async fn sync_threads(
        &self,
        organization_id: Uuid,
        quote_request_id: Uuid,
        force_resync: bool,
    ) -> Result<SyncSummary> {
        let quote = self
            .store
            .find_quote_request(organization_id, quote_request_id)
            .await?
            .ok_or(AppError::NotFound("Quote request not found".to_string()))?;

        // Candidates come from the junction as well as the singular column,
        // so they are collected before a forced resync drops the links.
        let threads = self.store.candidate_threads(quote_request_id).await?;

        if force_resync {
            self.store.delete_links_for_request(quote_request_id).await?;
        }

        let suppliers = self
            .store
            .suppliers_by_ids(organization_id, &quote.supplier_set())
            .await?;
        let existing: Vec<QuoteRequestEmailThread> = if force_resync {
            Vec::new()
        } else {
            self.store.links_for_request(quote_request_id).await?
        };

        let mut summary = SyncSummary {
            linked: 0,
            already_linked: 0,
            unmatched: 0,
            errors: 0,
            threads: Vec::new(),
        };

        for thread in &threads {
            let outcome = self
                .sync_one(thread, &suppliers, &existing, quote_request_id)
                .await;
            match outcome {
                Ok((supplier_id, label)) => {
                    match label {
                        "linked" => summary.linked += 1,
                        "already_linked" => summary.already_linked += 1,
                        _ => summary.unmatched += 1,
                    }
                    summary.threads.push(SyncThreadOutcome {
                        thread_id: thread.id,
                        supplier_id,
                        outcome: label.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!("Thread {} failed to sync: {}", thread.id, e);
                    summary.errors += 1;
                    summary.threads.push(SyncThreadOutcome {
                        thread_id: thread.id,
                        supplier_id: None,
                        outcome: "error".to_string(),
                    });
                }
            }
        }

        Ok(summary)
    }

    async fn sync_one(
        &self,
        thread: &EmailThread,
        suppliers: &[Supplier],
        existing: &[QuoteRequestEmailThread],
        quote_request_id: Uuid,
    ) -> Result<(Option<Uuid>, &'static str)> {
        let recipient = match self.store.earliest_outbound_recipient(thread.id).await? {
            Some(addr) => addr,
            None => return Ok((None, "unmatched")),
        };
        let supplier = suppliers.iter().find(|s| s.matches_address(&recipient));
        let supplier = match supplier {
            Some(s) => s,
            None => return Ok((None, "unmatched")),
        };

        if existing
            .iter()
            .any(|link| link.supplier_id == supplier.id)
        {
            return Ok((Some(supplier.id), "already_linked"));
        }

        match self
            .store
            .link_thread(quote_request_id, supplier.id, thread.id, false)
            .await?
        {
            LinkOutcome::Linked(_) => Ok((Some(supplier.id), "linked")),
            LinkOutcome::AlreadyLinked => Ok((Some(supplier.id), "already_linked")),
        }
    }

    /// When the thread's inbound reply came from an unknown address belonging
    /// to a known supplier, remember it. Returns the address if it was new.
    async fn learn_reply_address(
        &self,
        organization_id: Uuid,
        supplier_id: Uuid,
        thread: &EmailThread,
    ) -> Result<Option<String>> {
        let supplier = match self.store.find_supplier(organization_id, supplier_id).await? {
            Some(s) => s,
            None => return Ok(None),
        };
        let first = match self.store.first_message(thread.id).await? {
            Some(m) => m,
            None => return Ok(None),
        };
        if first.direction != "INBOUND" {
            return Ok(None);
        }
        let from = first.from_address;
        if supplier.matches_address(&from) {
            return Ok(None);
        }
        self.store.append_supplier_aux_email(supplier_id, &from).await?;
        tracing::info!(
            "Recorded auxiliary address {} for supplier {}",
            from,
            supplier_id
        );
        Ok(Some(from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::email_thread::EmailThreadStatus;
    use crate::models::quote_request::QuoteRequestStatus;
    use crate::repositories::memory_store::{self, link, message, thread, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        organization_id: Uuid,
        supplier_id: Uuid,
        quote_request_id: Uuid,
    }

    fn fixture() -> Fixture {
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
            QuoteRequestStatus::Sent,
        );
        let quote_request_id = quote.id;
        store.add_quote_request(quote);

        Fixture {
            store,
            organization_id,
            supplier_id,
            quote_request_id,
        }
    }

    fn orphan(f: &Fixture) -> Uuid {
        let t = thread(
            f.organization_id,
            Some(f.supplier_id),
            None,
            None,
            EmailThreadStatus::ResponseReceived,
        );
        let id = t.id;
        f.store.add_thread(t);
        id
    }

    #[tokio::test]
    async fn merge_moves_messages_and_second_merge_is_not_found() {
        let f = fixture();
        let source_id = orphan(&f);
        let target_id = orphan(&f);
        f.store.add_message(message(
            source_id,
            "INBOUND",
            "sales@nordparts.test",
            "fleet@harbourfreight.test",
        ));

        let service = ThreadReconciliationService::new(f.store.clone());
        let target = service
            .merge(f.organization_id, Uuid::new_v4(), source_id, target_id)
            .await
            .unwrap();

        assert_eq!(target.id, target_id);
        assert!(f.store.thread(source_id).is_none());
        assert_eq!(f.store.messages_for(target_id).len(), 1);

        // The source row is gone; a replayed merge must not invent one.
        let err = service
            .merge(f.organization_id, Uuid::new_v4(), source_id, target_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn merge_into_itself_is_rejected() {
        let f = fixture();
        let id = orphan(&f);
        let service = ThreadReconciliationService::new(f.store.clone());
        let err = service
            .merge(f.organization_id, Uuid::new_v4(), id, id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn assign_rejects_junction_linked_thread() {
        let f = fixture();
        // Singular column empty, but the junction already correlates the
        // thread with a request.
        let thread_id = orphan(&f);
        f.store
            .add_link(link(f.quote_request_id, f.supplier_id, thread_id, false));

        let service = ThreadReconciliationService::new(f.store.clone());
        let err = service
            .assign_orphan(
                f.organization_id,
                Uuid::new_v4(),
                thread_id,
                f.quote_request_id,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn assign_learns_unknown_reply_address() {
        let f = fixture();
        let thread_id = orphan(&f);
        f.store.add_message(message(
            thread_id,
            "INBOUND",
            "j.virtanen@nordparts-sales.test",
            "fleet@harbourfreight.test",
        ));

        let service = ThreadReconciliationService::new(f.store.clone());
        let outcome = service
            .assign_orphan(
                f.organization_id,
                Uuid::new_v4(),
                thread_id,
                f.quote_request_id,
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.learned_address.as_deref(),
            Some("j.virtanen@nordparts-sales.test")
        );
        let supplier = f.store.supplier_record(f.supplier_id);
        assert!(supplier.matches_address("j.virtanen@nordparts-sales.test"));
        assert_eq!(
            f.store.thread(thread_id).unwrap().quote_request_id,
            Some(f.quote_request_id)
        );
    }

    #[tokio::test]
    async fn assign_keeps_singular_slot_unique() {
        let f = fixture();
        // Another thread already points directly at the request.
        let t = thread(
            f.organization_id,
            Some(f.supplier_id),
            Some(f.quote_request_id),
            None,
            EmailThreadStatus::Sent,
        );
        f.store.add_thread(t);

        let second_supplier =
            memory_store::supplier(f.organization_id, "Baltic Auto", "quotes@balticauto.test");
        let second_id = second_supplier.id;
        f.store.add_supplier(second_supplier);

        let orphan_id = orphan(&f);
        let service = ThreadReconciliationService::new(f.store.clone());
        service
            .assign_orphan(
                f.organization_id,
                Uuid::new_v4(),
                orphan_id,
                f.quote_request_id,
                Some(second_id),
            )
            .await
            .unwrap();

        // The orphan is correlated through the junction only.
        assert_eq!(f.store.thread(orphan_id).unwrap().quote_request_id, None);
        assert!(f
            .store
            .links()
            .iter()
            .any(|l| l.email_thread_id == orphan_id && l.supplier_id == second_id));
    }

    #[tokio::test]
    async fn sync_links_thread_by_outbound_recipient() {
        let f = fixture();
        let t = thread(
            f.organization_id,
            None,
            Some(f.quote_request_id),
            None,
            EmailThreadStatus::Sent,
        );
        let thread_id = t.id;
        f.store.add_thread(t);
        f.store.add_message(message(
            thread_id,
            "OUTBOUND",
            "fleet@harbourfreight.test",
            "sales@nordparts.test",
        ));

        let service = ThreadReconciliationService::new(f.store.clone());
        let summary = service
            .sync_threads(f.organization_id, f.quote_request_id, false)
            .await
            .unwrap();

        assert_eq!(summary.linked, 1);
        assert_eq!(summary.errors, 0);
        assert!(f
            .store
            .links()
            .iter()
            .any(|l| l.email_thread_id == thread_id && l.supplier_id == f.supplier_id));
    }

    #[tokio::test]
    async fn forced_sync_still_sees_junction_only_threads() {
        let f = fixture();
        // Correlated through the junction alone; a forced resync must not
        // lose it when the links are dropped.
        let t = thread(
            f.organization_id,
            Some(f.supplier_id),
            None,
            None,
            EmailThreadStatus::Sent,
        );
        let thread_id = t.id;
        f.store.add_thread(t);
        f.store
            .add_link(link(f.quote_request_id, f.supplier_id, thread_id, false));
        f.store.add_message(message(
            thread_id,
            "OUTBOUND",
            "fleet@harbourfreight.test",
            "sales@nordparts.test",
        ));

        let service = ThreadReconciliationService::new(f.store.clone());
        let summary = service
            .sync_threads(f.organization_id, f.quote_request_id, true)
            .await
            .unwrap();

        assert_eq!(summary.linked, 1);
        assert!(f
            .store
            .links()
            .iter()
            .any(|l| l.email_thread_id == thread_id && l.supplier_id == f.supplier_id));
    }
}
