//! Dead-letter queue administration.
//!
//! Records that exhausted their automatic retry budget sit in the DLQ until a
//! human operator intervenes. This module provides the two admin operations:
//! a paginated, side-effect-free listing (most-recently-failed first) and a
//! manual requeue that applies exactly the DLQ→PENDING transition of the sync
//! state machine.
//!
//! Listings pair each sync record with a display summary of its owning
//! entity, resolved through the [`EntityDirectory`] seam. The patient data
//! model itself lives outside this core; an id the directory cannot resolve
//! simply yields no summary.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::sync::{SyncError, SyncRecord, SyncStatus, SyncStore, SyncTracker};

/// Largest page an admin listing will return.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Read-only lookup of owning-entity display summaries.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// A short human-readable summary for the entity (e.g. patient name),
    /// or `None` if the id cannot be resolved.
    async fn summary(&self, id: &str) -> Option<String>;
}

/// One DLQ listing entry: the sync record plus its owning-entity summary.
#[derive(Clone, Debug, Serialize)]
pub struct DlqItem {
    /// The dead-lettered sync record.
    pub record: SyncRecord,
    /// Display summary of the owning entity, when the directory knows it.
    pub summary: Option<String>,
}

/// One page of DLQ listing results.
#[derive(Clone, Debug, Serialize)]
pub struct DlqPage {
    /// The records on this page, most recently failed first.
    pub items: Vec<DlqItem>,
    /// Total dead-lettered records across all pages.
    pub total: u64,
    /// The 1-based page that was served.
    pub page: usize,
    /// The effective (clamped) page size.
    pub page_size: usize,
}

/// Admin surface over the dead-letter queue.
#[derive(Clone)]
pub struct DlqService {
    store: Arc<dyn SyncStore>,
    tracker: SyncTracker,
    directory: Arc<dyn EntityDirectory>,
}

impl DlqService {
    /// Create the service over the tracker's store and an entity directory.
    pub fn new(
        store: Arc<dyn SyncStore>,
        tracker: SyncTracker,
        directory: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            store,
            tracker,
            directory,
        }
    }

    /// List dead-lettered records, most recently failed first.
    ///
    /// Pure read, no side effects. `page` is 1-based (0 is treated as 1);
    /// `page_size` is clamped to 1..=[`MAX_PAGE_SIZE`] so an operator cannot
    /// request an unbounded scan. The returned page echoes the effective
    /// values.
    ///
    /// # Errors
    ///
    /// Propagates [`SyncError::StoreUnavailable`] from the backing store.
    pub async fn list(&self, page: usize, page_size: usize) -> Result<DlqPage, SyncError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1) * page_size;

        let (records, total) = self
            .store
            .list_by_status(SyncStatus::Dlq, offset, page_size)
            .await?;

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let summary = self.directory.summary(&record.id).await;
            items.push(DlqItem { record, summary });
        }

        Ok(DlqPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Manually requeue one dead-lettered record.
    ///
    /// Delegates to [`SyncTracker::requeue`]: DLQ→PENDING with the retry
    /// count preserved, and a no-op returning the current record for any
    /// other state (operators double-click).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for an unknown id.
    pub async fn requeue(&self, id: &str) -> Result<SyncRecord, SyncError> {
        self.tracker.requeue(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryEntityDirectory, InMemorySyncStore};
    use crate::sync::AttemptOutcome;

    struct Fixture {
        tracker: SyncTracker,
        directory: Arc<InMemoryEntityDirectory>,
        service: DlqService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySyncStore::new());
        let tracker = SyncTracker::new(store.clone(), 8);
        let directory = Arc::new(InMemoryEntityDirectory::new());
        let service = DlqService::new(store, tracker.clone(), directory.clone());
        Fixture {
            tracker,
            directory,
            service,
        }
    }

    async fn dead_letter(tracker: &SyncTracker, id: &str) {
        tracker.enroll(id).await.expect("enroll");
        for _ in 0..8 {
            tracker
                .record_attempt(
                    id,
                    AttemptOutcome::Failure {
                        message: "timeout".into(),
                    },
                )
                .await
                .expect("attempt");
        }
    }

    #[tokio::test]
    async fn lists_only_dead_lettered_records() {
        let fx = fixture();
        dead_letter(&fx.tracker, "dead-1").await;
        fx.tracker.enroll("still-pending").await.expect("enroll");

        let page = fx.service.list(1, 10).await.expect("list");
        assert_eq!(page.total, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].record.id, "dead-1");
        assert_eq!(page.items[0].record.status, SyncStatus::Dlq);
    }

    #[tokio::test]
    async fn newest_failures_come_first() {
        let fx = fixture();
        dead_letter(&fx.tracker, "first-dead").await;
        dead_letter(&fx.tracker, "second-dead").await;

        let page = fx.service.list(1, 10).await.expect("list");
        let ids: Vec<&str> = page.items.iter().map(|i| i.record.id.as_str()).collect();
        assert_eq!(ids, ["second-dead", "first-dead"]);
    }

    #[tokio::test]
    async fn resolves_entity_summaries_where_known() {
        let fx = fixture();
        dead_letter(&fx.tracker, "known").await;
        dead_letter(&fx.tracker, "unknown").await;
        fx.directory.insert("known", "Ama Mensah").await;

        let page = fx.service.list(1, 10).await.expect("list");
        let known = page
            .items
            .iter()
            .find(|i| i.record.id == "known")
            .expect("known item");
        let unknown = page
            .items
            .iter()
            .find(|i| i.record.id == "unknown")
            .expect("unknown item");

        assert_eq!(known.summary.as_deref(), Some("Ama Mensah"));
        assert_eq!(unknown.summary, None);
    }

    #[tokio::test]
    async fn clamps_page_inputs() {
        let fx = fixture();
        dead_letter(&fx.tracker, "dead-1").await;

        let page = fx.service.list(0, 0).await.expect("list");
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);

        let page = fx.service.list(1, 10_000).await.expect("list");
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn pages_beyond_the_end_are_empty_with_stable_total() {
        let fx = fixture();
        dead_letter(&fx.tracker, "dead-1").await;
        dead_letter(&fx.tracker, "dead-2").await;

        let page = fx.service.list(5, 10).await.expect("list");
        assert!(page.items.is_empty());
        assert_eq!(page.total, 2);
        assert_eq!(page.page, 5);
    }

    #[tokio::test]
    async fn requeue_round_trips_through_the_tracker() {
        let fx = fixture();
        dead_letter(&fx.tracker, "dead-1").await;

        let record = fx.service.requeue("dead-1").await.expect("requeue");
        assert_eq!(record.status, SyncStatus::Pending);
        assert_eq!(record.retry_count, 8);

        // Listing no longer shows it.
        let page = fx.service.list(1, 10).await.expect("list");
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn requeue_unknown_id_is_not_found() {
        let fx = fixture();
        let err = fx.service.requeue("ghost").await.expect_err("unknown id");
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
