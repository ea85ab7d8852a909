//! In-memory implementations of the external collaborator seams.
//!
//! Production deployments point the trait seams at real services (the
//! facility's allocation backend, its shared settings store, the EMR
//! database). These implementations back development builds and tests, where
//! deterministic behaviour and failure injection matter more than
//! durability. Nothing here survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::allocator::{AllocationBackend, BackendError, CounterStore, StoreError};
use crate::dlq::EntityDirectory;
use crate::sync::{StatusCounts, SyncError, SyncRecord, SyncStatus, SyncStore};

/// In-memory allocation backend.
///
/// The write lock serialises increments per call, so this honours the
/// linearizable "next value" contract of [`AllocationBackend`] within a
/// single process.
#[derive(Default)]
pub struct InMemoryAllocationBackend {
    counters: RwLock<HashMap<String, u32>>,
}

impl InMemoryAllocationBackend {
    /// Creates an empty backend; every prefix starts at 1.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AllocationBackend for InMemoryAllocationBackend {
    async fn next_sequence(&self, prefix: &str) -> Result<u32, BackendError> {
        let mut counters = self.counters.write().await;
        let counter = counters.entry(prefix.to_owned()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

/// In-memory shared counter store: a plain map, last writer wins.
#[derive(Default)]
pub struct InMemoryCounterStore {
    values: RwLock<HashMap<String, u32>>,
}

impl InMemoryCounterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u32>, StoreError> {
        Ok(self.values.read().await.get(key).copied())
    }

    async fn upsert(&self, key: &str, value: u32) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// In-memory sync record store.
#[derive(Default)]
pub struct InMemorySyncStore {
    records: RwLock<HashMap<String, SyncRecord>>,
}

impl InMemorySyncStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStore for InMemorySyncStore {
    async fn get(&self, id: &str) -> Result<Option<SyncRecord>, SyncError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn put(&self, record: SyncRecord) -> Result<(), SyncError> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), SyncError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: SyncStatus,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<SyncRecord>, u64), SyncError> {
        let mut matching: Vec<SyncRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect();

        // Most recently attempted first; never-attempted records sort last,
        // newest enrolment first among them.
        matching.sort_by(|left, right| {
            right
                .last_attempt_at
                .cmp(&left.last_attempt_at)
                .then(right.created_at.cmp(&left.created_at))
        });

        let total = matching.len() as u64;
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn status_counts(&self) -> Result<StatusCounts, SyncError> {
        let mut counts = StatusCounts::default();
        for record in self.records.read().await.values() {
            match record.status {
                SyncStatus::Pending => counts.pending += 1,
                SyncStatus::Success => counts.success += 1,
                SyncStatus::Failed => counts.failed += 1,
                SyncStatus::Dlq => counts.dlq += 1,
            }
        }
        Ok(counts)
    }
}

/// In-memory entity directory for DLQ listings.
#[derive(Default)]
pub struct InMemoryEntityDirectory {
    summaries: RwLock<HashMap<String, String>>,
}

impl InMemoryEntityDirectory {
    /// Creates an empty directory; every lookup yields no summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display summary for an entity id.
    pub async fn insert(&self, id: impl Into<String>, summary: impl Into<String>) {
        self.summaries
            .write()
            .await
            .insert(id.into(), summary.into());
    }
}

#[async_trait]
impl EntityDirectory for InMemoryEntityDirectory {
    async fn summary(&self, id: &str) -> Option<String> {
        self.summaries.read().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn record(id: &str, status: SyncStatus, attempted_secs_ago: Option<i64>) -> SyncRecord {
        SyncRecord {
            id: id.to_owned(),
            status,
            retry_count: 0,
            last_attempt_at: attempted_secs_ago
                .map(|secs| Utc::now() - ChronoDuration::seconds(secs)),
            external_id: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn backend_serialises_per_prefix_counters() {
        let backend = InMemoryAllocationBackend::new();
        assert_eq!(backend.next_sequence("GAR-KBTH-2025").await.expect("next"), 1);
        assert_eq!(backend.next_sequence("GAR-KBTH-2025").await.expect("next"), 2);
        assert_eq!(backend.next_sequence("AR-KATH-2025").await.expect("next"), 1);
    }

    #[tokio::test]
    async fn counter_store_round_trips() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.get("GAR-KBTH-2025").await.expect("get"), None);
        store.upsert("GAR-KBTH-2025", 7).await.expect("upsert");
        assert_eq!(store.get("GAR-KBTH-2025").await.expect("get"), Some(7));
    }

    #[tokio::test]
    async fn sync_store_lists_most_recently_attempted_first() {
        let store = InMemorySyncStore::new();
        store
            .put(record("old", SyncStatus::Dlq, Some(300)))
            .await
            .expect("put");
        store
            .put(record("fresh", SyncStatus::Dlq, Some(10)))
            .await
            .expect("put");
        store
            .put(record("other-status", SyncStatus::Failed, Some(1)))
            .await
            .expect("put");

        let (page, total) = store
            .list_by_status(SyncStatus::Dlq, 0, 10)
            .await
            .expect("list");
        assert_eq!(total, 2);
        let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["fresh", "old"]);
    }

    #[tokio::test]
    async fn sync_store_paginates_with_stable_total() {
        let store = InMemorySyncStore::new();
        for i in 0..5 {
            store
                .put(record(&format!("r{i}"), SyncStatus::Dlq, Some(i * 10)))
                .await
                .expect("put");
        }

        let (page, total) = store
            .list_by_status(SyncStatus::Dlq, 2, 2)
            .await
            .expect("list");
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["r2", "r3"]);
    }

    #[tokio::test]
    async fn directory_resolves_registered_summaries_only() {
        let directory = InMemoryEntityDirectory::new();
        directory.insert("patient-1", "Ama Mensah").await;

        assert_eq!(
            directory.summary("patient-1").await.as_deref(),
            Some("Ama Mensah")
        );
        assert_eq!(directory.summary("ghost").await, None);
    }
}
