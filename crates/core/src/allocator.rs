//! Two-tier folder number allocation.
//!
//! Allocation prefers a linearizable *allocation backend* whose "next
//! sequence for prefix" operation serialises increments, making the primary
//! path race-free. When that backend is unreachable, errors, times out, or
//! returns a malformed value, allocation degrades to a *shared counter store*
//! fallback: read the last-issued value, add one, and write it back
//! fire-and-forget.
//!
//! The fallback is deliberately not safe under concurrent callers. Two
//! callers can read the same counter value and mint the same folder number.
//! Registration availability is chosen over strict uniqueness when the
//! primary allocator is down; the [`SequenceAllocator::fallback_allocations`]
//! metric tells operators when that duplicate-risk window was open.
//!
//! The two paths are kept in separate functions so the weaker guarantees of
//! the fallback stay auditable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use folder_number::{
    current_year, prefix_for, FolderNumber, FolderNumberResult, RegionCode, MIN_SEQUENCE,
};
use tokio::time::timeout;

/// Error type for allocation backend calls.
///
/// The allocator treats every variant the same way (fall back); the split
/// exists for logging and for backend implementations to be precise.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or returned a server-side failure.
    #[error("allocation backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the payload was unusable.
    #[error("allocation backend returned a malformed response: {0}")]
    Malformed(String),
}

/// Error type for shared counter store calls.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or the operation failed.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// The linearizable "next sequence for prefix" operation.
///
/// Implementations must serialise increments per prefix: two concurrent calls
/// for the same prefix must never observe the same value. This is the
/// load-bearing assumption that makes the primary allocation path race-free.
///
/// Idempotency is not assumed; a retried call may burn a sequence number,
/// which is acceptable (folder numbers may have gaps, never duplicates on
/// this path).
#[async_trait]
pub trait AllocationBackend: Send + Sync {
    /// Atomically issue the next sequence number for `prefix`.
    ///
    /// The first call for a fresh prefix returns 1.
    async fn next_sequence(&self, prefix: &str) -> Result<u32, BackendError>;
}

/// The shared counter store used by the fallback path.
///
/// A plain key/value interface: key is the `region-facility-year` prefix,
/// value is the last-issued sequence. Writes are best-effort and not
/// linearizable; last writer wins.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the last-issued sequence for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<u32>, StoreError>;

    /// Record `value` as the last-issued sequence for `key`.
    async fn upsert(&self, key: &str, value: u32) -> Result<(), StoreError>;
}

/// Mints globally-unique, human-readable patient folder numbers.
///
/// See the module documentation for the two-tier strategy. Both collaborator
/// calls are bounded by a timeout so a slow backend can never block
/// registration; a timed-out primary call falls through to the fallback.
pub struct SequenceAllocator {
    backend: Arc<dyn AllocationBackend>,
    store: Arc<dyn CounterStore>,
    backend_timeout: Duration,
    fallback_allocations: AtomicU64,
}

impl SequenceAllocator {
    /// Create an allocator over the given collaborators.
    ///
    /// # Arguments
    ///
    /// * `backend` - The linearizable allocation backend (primary path).
    /// * `store` - The shared counter store (fallback path).
    /// * `backend_timeout` - Upper bound on a single collaborator call.
    pub fn new(
        backend: Arc<dyn AllocationBackend>,
        store: Arc<dyn CounterStore>,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            backend_timeout,
            fallback_allocations: AtomicU64::new(0),
        }
    }

    /// Allocate a folder number for a registration in `region` at `facility`.
    ///
    /// Tries the primary path first and degrades to the fallback path on any
    /// backend failure; backend unavailability is never surfaced to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Only input validation fails this call: an unknown facility format
    /// yields `FolderNumberError::InvalidFacility`. A fallback counter that
    /// has exhausted the 6-digit sequence space surfaces as
    /// `FolderNumberError::SequenceOutOfRange`.
    pub async fn allocate(
        &self,
        region: RegionCode,
        facility: &str,
    ) -> FolderNumberResult<FolderNumber> {
        let year = current_year();

        // Validate inputs before touching any counter, so garbage input never
        // burns a sequence number.
        FolderNumber::new(region, facility, year, MIN_SEQUENCE)?;

        let prefix = prefix_for(region, facility, Some(year));
        if let Some(folder) = self.allocate_primary(&prefix, region, facility, year).await {
            return Ok(folder);
        }
        self.allocate_fallback(&prefix, region, facility, year).await
    }

    /// Read-only preview of the sequence the fallback path would assign next.
    ///
    /// Diagnostic only: nothing is reserved, and a concurrent allocation can
    /// invalidate the answer immediately. Any read failure yields 1; this
    /// call never errors.
    pub async fn next_sequence_preview(&self, region: RegionCode, facility: &str) -> u32 {
        let prefix = prefix_for(region, facility, None);
        self.read_counter(&prefix).await + 1
    }

    /// How many allocations have gone through the fallback path since this
    /// allocator was constructed.
    ///
    /// A non-zero delta between scrapes means duplicate-risk windows were
    /// open; operators should check the allocation backend.
    pub fn fallback_allocations(&self) -> u64 {
        self.fallback_allocations.load(Ordering::Relaxed)
    }

    /// Primary path: ask the allocation backend for the next sequence.
    ///
    /// Returns `None` when the backend is unavailable, times out, or returns
    /// a value that does not survive field validation; the caller falls
    /// through to the fallback. A malformed identifier is never propagated.
    async fn allocate_primary(
        &self,
        prefix: &str,
        region: RegionCode,
        facility: &str,
        year: i32,
    ) -> Option<FolderNumber> {
        let sequence = match timeout(self.backend_timeout, self.backend.next_sequence(prefix)).await
        {
            Ok(Ok(sequence)) => sequence,
            Ok(Err(err)) => {
                tracing::warn!(%prefix, %err, "allocation backend failed; using fallback");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    %prefix,
                    timeout_ms = self.backend_timeout.as_millis() as u64,
                    "allocation backend timed out; using fallback"
                );
                return None;
            }
        };

        match FolderNumber::new(region, facility, year, sequence) {
            Ok(folder) => Some(folder),
            Err(err) => {
                tracing::warn!(
                    %prefix,
                    sequence,
                    %err,
                    "allocation backend returned an out-of-range sequence; using fallback"
                );
                None
            }
        }
    }

    /// Fallback path: read-increment-write against the shared counter store.
    ///
    /// Not protected by any lock. Concurrent callers can race and mint
    /// duplicates; this is the documented availability-over-uniqueness
    /// trade-off. The write back is fire-and-forget: the folder number is
    /// returned whether or not the new counter value was durably stored, so a
    /// crash between read and write can duplicate or skip sequences.
    ///
    /// The counter key embeds the current year, so a counter left over from a
    /// prior year never influences a new year's allocations; the first
    /// fallback allocation of a new year starts at 1.
    async fn allocate_fallback(
        &self,
        prefix: &str,
        region: RegionCode,
        facility: &str,
        year: i32,
    ) -> FolderNumberResult<FolderNumber> {
        self.fallback_allocations.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            %prefix,
            "allocating via counter-store fallback; duplicates possible under concurrent callers"
        );

        let next = self.read_counter(prefix).await + 1;

        match timeout(self.backend_timeout, self.store.upsert(prefix, next)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(%prefix, next, %err, "failed to persist fallback sequence");
            }
            Err(_) => {
                tracing::warn!(%prefix, next, "counter store write timed out");
            }
        }

        FolderNumber::new(region, facility, year, next)
    }

    /// Read the counter for `prefix`, treating "not found" and every failure
    /// mode as "no prior sequence" (0).
    async fn read_counter(&self, prefix: &str) -> u32 {
        match timeout(self.backend_timeout, self.store.get(prefix)).await {
            Ok(Ok(Some(value))) => value,
            Ok(Ok(None)) => 0,
            Ok(Err(err)) => {
                tracing::warn!(%prefix, %err, "counter store read failed; assuming no prior sequence");
                0
            }
            Err(_) => {
                tracing::warn!(%prefix, "counter store read timed out; assuming no prior sequence");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryAllocationBackend, InMemoryCounterStore};
    use folder_number::FolderNumberError;

    const TEST_TIMEOUT: Duration = Duration::from_millis(50);

    /// Backend that always reports itself unreachable.
    struct UnavailableBackend;

    #[async_trait]
    impl AllocationBackend for UnavailableBackend {
        async fn next_sequence(&self, _prefix: &str) -> Result<u32, BackendError> {
            Err(BackendError::Unavailable("connection refused".into()))
        }
    }

    /// Backend that answers after the allocator's patience has run out.
    struct SlowBackend;

    #[async_trait]
    impl AllocationBackend for SlowBackend {
        async fn next_sequence(&self, _prefix: &str) -> Result<u32, BackendError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1)
        }
    }

    /// Backend that returns a sequence outside the issuable range.
    struct MalformedBackend;

    #[async_trait]
    impl AllocationBackend for MalformedBackend {
        async fn next_sequence(&self, _prefix: &str) -> Result<u32, BackendError> {
            Ok(7_000_000)
        }
    }

    /// Counter store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<u32>, StoreError> {
            Err(StoreError::Unavailable("read failed".into()))
        }

        async fn upsert(&self, _key: &str, _value: u32) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("write failed".into()))
        }
    }

    fn allocator_with(
        backend: Arc<dyn AllocationBackend>,
        store: Arc<dyn CounterStore>,
    ) -> SequenceAllocator {
        SequenceAllocator::new(backend, store, TEST_TIMEOUT)
    }

    #[tokio::test]
    async fn primary_path_uses_backend_sequence() {
        let backend = Arc::new(InMemoryAllocationBackend::new());
        let store = Arc::new(InMemoryCounterStore::new());
        let allocator = allocator_with(backend, store);

        let first = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");
        let second = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");

        assert_eq!(first.sequence(), 1);
        assert_eq!(second.sequence(), 2);
        assert_eq!(allocator.fallback_allocations(), 0);
    }

    #[tokio::test]
    async fn fallback_starts_fresh_prefix_at_one() {
        let allocator = allocator_with(
            Arc::new(UnavailableBackend),
            Arc::new(InMemoryCounterStore::new()),
        );

        let folder = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");

        assert_eq!(folder.sequence(), 1);
        assert_eq!(allocator.fallback_allocations(), 1);
    }

    #[tokio::test]
    async fn fallback_continues_from_stored_counter() {
        let store = Arc::new(InMemoryCounterStore::new());
        let prefix = prefix_for(RegionCode::Gar, "KBTH", None);
        store.upsert(&prefix, 42).await.expect("seed counter");

        let allocator = allocator_with(Arc::new(UnavailableBackend), store.clone());
        let folder = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");

        assert_eq!(folder.sequence(), 43);
        // The incremented value was written back.
        assert_eq!(store.get(&prefix).await.expect("read"), Some(43));
    }

    #[tokio::test]
    async fn fallback_ignores_previous_years_counter() {
        let store = Arc::new(InMemoryCounterStore::new());
        let last_year = prefix_for(RegionCode::Gar, "KBTH", Some(current_year() - 1));
        store.upsert(&last_year, 4711).await.expect("seed counter");

        let allocator = allocator_with(Arc::new(UnavailableBackend), store);
        let folder = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");

        assert_eq!(folder.sequence(), 1);
        assert_eq!(folder.year(), current_year());
    }

    #[tokio::test]
    async fn backend_timeout_falls_through_to_fallback() {
        let allocator = allocator_with(
            Arc::new(SlowBackend),
            Arc::new(InMemoryCounterStore::new()),
        );

        let folder = allocator
            .allocate(RegionCode::Ar, "KATH")
            .await
            .expect("allocate");

        assert_eq!(folder.sequence(), 1);
        assert_eq!(allocator.fallback_allocations(), 1);
    }

    #[tokio::test]
    async fn malformed_backend_output_is_discarded() {
        let allocator = allocator_with(
            Arc::new(MalformedBackend),
            Arc::new(InMemoryCounterStore::new()),
        );

        let folder = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");

        // The out-of-range backend value never reaches the caller.
        assert_eq!(folder.sequence(), 1);
        assert_eq!(allocator.fallback_allocations(), 1);
    }

    #[tokio::test]
    async fn broken_store_still_allocates() {
        let allocator = allocator_with(Arc::new(UnavailableBackend), Arc::new(BrokenStore));

        let folder = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");

        // Unreadable store is treated as "no prior sequence"; the failed
        // write-back is swallowed.
        assert_eq!(folder.sequence(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_facility_before_counting() {
        let backend = Arc::new(InMemoryAllocationBackend::new());
        let allocator = allocator_with(backend, Arc::new(InMemoryCounterStore::new()));

        let err = allocator
            .allocate(RegionCode::Gar, "kb th")
            .await
            .expect_err("should reject facility");
        assert!(matches!(err, FolderNumberError::InvalidFacility(_)));

        // No sequence was burned for the bad request.
        let folder = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");
        assert_eq!(folder.sequence(), 1);
    }

    #[tokio::test]
    async fn preview_defaults_to_one() {
        let allocator = allocator_with(Arc::new(UnavailableBackend), Arc::new(BrokenStore));
        assert_eq!(
            allocator.next_sequence_preview(RegionCode::Gar, "KBTH").await,
            1
        );
    }

    #[tokio::test]
    async fn preview_reads_without_reserving() {
        let store = Arc::new(InMemoryCounterStore::new());
        let prefix = prefix_for(RegionCode::Gar, "KBTH", None);
        store.upsert(&prefix, 42).await.expect("seed counter");

        let allocator = allocator_with(Arc::new(UnavailableBackend), store.clone());
        assert_eq!(
            allocator.next_sequence_preview(RegionCode::Gar, "KBTH").await,
            43
        );
        // Preview must not move the counter.
        assert_eq!(store.get(&prefix).await.expect("read"), Some(42));
    }

    #[tokio::test]
    async fn allocated_numbers_are_canonical() {
        let allocator = allocator_with(
            Arc::new(InMemoryAllocationBackend::new()),
            Arc::new(InMemoryCounterStore::new()),
        );

        let folder = allocator
            .allocate(RegionCode::Gar, "KBTH")
            .await
            .expect("allocate");
        assert!(FolderNumber::is_valid(&folder.to_string()));
    }
}
