//! NHIE synchronisation status tracking.
//!
//! Every locally-persisted registration gets exactly one [`SyncRecord`]
//! describing how its reconciliation with the external health information
//! exchange is going. The record is a small finite state machine:
//!
//! | From    | Event                                      | To      |
//! |---------|--------------------------------------------|---------|
//! | PENDING | attempt succeeds                           | SUCCESS |
//! | PENDING | attempt fails                              | FAILED  |
//! | FAILED  | retry succeeds                             | SUCCESS |
//! | FAILED  | retry fails, budget remaining              | FAILED  |
//! | FAILED  | retry fails, budget exhausted              | DLQ     |
//! | DLQ     | manual requeue                             | PENDING |
//!
//! SUCCESS is terminal. DLQ is terminal for automatic processing; only a
//! manual requeue re-enters the machine. FAILED and DLQ are business-as-usual
//! states, not error conditions: the tracker never errors for them. An
//! attempt reported against SUCCESS or DLQ is a programmer error and fails
//! fast.
//!
//! The [`SyncTracker`] is the sole mutator of sync records. Admin and UI code
//! read records and call the tracker; they never write status, retry count,
//! or error message directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed cadence at which clients poll a record's status.
///
/// A liveness aid only: clients derive their stop condition from the
/// authoritative record via [`SyncTracker::should_continue_polling`], never
/// from their own attempt counting.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Synchronisation lifecycle state of one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Created locally, no reconciliation outcome yet.
    Pending,
    /// Reconciled; the external identifier is recorded. Terminal.
    Success,
    /// At least one attempt failed; automatic retries continue while the
    /// budget lasts.
    Failed,
    /// Retry budget exhausted; waiting for manual intervention.
    Dlq,
}

impl SyncStatus {
    /// The wire form of this status (`PENDING`, `SUCCESS`, `FAILED`, `DLQ`).
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Success => "SUCCESS",
            SyncStatus::Failed => "FAILED",
            SyncStatus::Dlq => "DLQ",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronisation state of one externally-reconciled record.
///
/// Created at PENDING the moment the owning entity is persisted locally, and
/// destroyed only with it. Mutated exclusively through [`SyncTracker`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Opaque reference to the owning entity (e.g. a patient identifier).
    pub id: String,
    /// Current lifecycle state.
    pub status: SyncStatus,
    /// Failed attempts so far. Monotonically non-decreasing for the lifetime
    /// of the record; a manual requeue preserves it for audit.
    pub retry_count: u32,
    /// When the most recent attempt finished; absent before the first one.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// External-system identifier, assigned on SUCCESS.
    pub external_id: Option<String>,
    /// Failure detail from the most recent attempt; present on FAILED/DLQ.
    pub error_message: Option<String>,
    /// When the record was enrolled.
    pub created_at: DateTime<Utc>,
}

/// Result of one reconciliation attempt, reported by the external executor.
///
/// A timed-out attempt is reported as a [`AttemptOutcome::Failure`] and
/// consumes one retry.
#[derive(Clone, Debug)]
pub enum AttemptOutcome {
    /// The external system accepted the record and assigned an identifier.
    Success {
        /// Identifier assigned by the external system.
        external_id: String,
    },
    /// The attempt failed.
    Failure {
        /// Human-readable failure detail, kept for the audit trail.
        message: String,
    },
}

impl AttemptOutcome {
    fn event_name(&self) -> &'static str {
        match self {
            AttemptOutcome::Success { .. } => "attempt succeeded",
            AttemptOutcome::Failure { .. } => "attempt failed",
        }
    }
}

/// Per-status record totals, for the metrics surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Records awaiting their first outcome.
    pub pending: u64,
    /// Records reconciled successfully.
    pub success: u64,
    /// Records with retries still in budget.
    pub failed: u64,
    /// Dead-lettered records awaiting manual intervention.
    pub dlq: u64,
}

/// Error type for sync tracking operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No sync record exists for the given id.
    #[error("no sync record for {0}")]
    NotFound(String),

    /// An attempt was reported against a terminal state. This is a caller
    /// bug, not a business-as-usual failure.
    #[error("invalid transition: {event} reported for record in state {from}")]
    InvalidTransition {
        /// State the record was in.
        from: SyncStatus,
        /// The offending event.
        event: &'static str,
    },

    /// The backing sync store failed.
    #[error("sync store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Persistence seam for sync records.
///
/// Implementations own durability and ordering; the tracker owns every state
/// transition. `list_by_status` orders most-recently-attempted first (the DLQ
/// admin listing contract) and reports the total match count alongside the
/// requested page.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Fetch one record by owning-entity id.
    async fn get(&self, id: &str) -> Result<Option<SyncRecord>, SyncError>;

    /// Insert or replace a record.
    async fn put(&self, record: SyncRecord) -> Result<(), SyncError>;

    /// Remove a record; removing an absent record is a no-op.
    async fn remove(&self, id: &str) -> Result<(), SyncError>;

    /// Page through records in `status`, most recently attempted first.
    /// Returns the page and the total number of matching records.
    async fn list_by_status(
        &self,
        status: SyncStatus,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<SyncRecord>, u64), SyncError>;

    /// Count records per status.
    async fn status_counts(&self) -> Result<StatusCounts, SyncError>;
}

/// The sole mutator of [`SyncRecord`]s.
///
/// Applies the transition table from the module documentation against a
/// [`SyncStore`], enforcing the retry budget and the terminal states.
#[derive(Clone)]
pub struct SyncTracker {
    store: Arc<dyn SyncStore>,
    max_retries: u32,
}

impl SyncTracker {
    /// Create a tracker over `store` with the given retry budget.
    pub fn new(store: Arc<dyn SyncStore>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// The configured retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Enroll a newly-persisted entity for reconciliation.
    ///
    /// Creates the PENDING record with a zero retry count. Idempotent: if the
    /// entity is already enrolled, the existing record is returned unchanged,
    /// so a retried registration request cannot reset audit history.
    pub async fn enroll(&self, id: &str) -> Result<SyncRecord, SyncError> {
        if let Some(existing) = self.store.get(id).await? {
            return Ok(existing);
        }

        let record = SyncRecord {
            id: id.to_owned(),
            status: SyncStatus::Pending,
            retry_count: 0,
            last_attempt_at: None,
            external_id: None,
            error_message: None,
            created_at: Utc::now(),
        };
        self.store.put(record.clone()).await?;
        tracing::debug!(id, "enrolled record for NHIE sync");
        Ok(record)
    }

    /// Apply the outcome of one reconciliation attempt.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] if the entity was never enrolled.
    /// - [`SyncError::InvalidTransition`] if the record is in a terminal
    ///   state (SUCCESS, or DLQ awaiting manual requeue). This is a caller
    ///   bug: the executor kept attempting a record it should have stopped
    ///   processing.
    pub async fn record_attempt(
        &self,
        id: &str,
        outcome: AttemptOutcome,
    ) -> Result<SyncRecord, SyncError> {
        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_owned()))?;

        match record.status {
            SyncStatus::Pending | SyncStatus::Failed => {}
            from @ (SyncStatus::Success | SyncStatus::Dlq) => {
                let event = outcome.event_name();
                tracing::error!(id, %from, event, "attempt reported against a terminal record");
                return Err(SyncError::InvalidTransition { from, event });
            }
        }

        record.last_attempt_at = Some(Utc::now());
        match outcome {
            AttemptOutcome::Success { external_id } => {
                record.status = SyncStatus::Success;
                record.external_id = Some(external_id);
                record.error_message = None;
                tracing::info!(id, "record reconciled with NHIE");
            }
            AttemptOutcome::Failure { message } => {
                record.retry_count += 1;
                record.error_message = Some(message);
                if record.retry_count >= self.max_retries {
                    record.status = SyncStatus::Dlq;
                    tracing::warn!(
                        id,
                        retry_count = record.retry_count,
                        "retry budget exhausted; record dead-lettered"
                    );
                } else {
                    record.status = SyncStatus::Failed;
                    tracing::debug!(
                        id,
                        retry_count = record.retry_count,
                        "sync attempt failed; will retry"
                    );
                }
            }
        }

        self.store.put(record.clone()).await?;
        Ok(record)
    }

    /// Manually move a dead-lettered record back to PENDING.
    ///
    /// The retry count is preserved for audit; the error message is cleared.
    /// Idempotent in effect: a record in any non-DLQ state is returned
    /// unchanged, because a human operator may double-click.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for an unknown id.
    pub async fn requeue(&self, id: &str) -> Result<SyncRecord, SyncError> {
        let mut record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_owned()))?;

        if record.status != SyncStatus::Dlq {
            return Ok(record);
        }

        record.status = SyncStatus::Pending;
        record.error_message = None;
        self.store.put(record.clone()).await?;
        tracing::info!(
            id,
            retry_count = record.retry_count,
            "dead-lettered record manually requeued"
        );
        Ok(record)
    }

    /// Authoritative read of one record's state.
    pub async fn status(&self, id: &str) -> Result<Option<SyncRecord>, SyncError> {
        self.store.get(id).await
    }

    /// Remove a record because its owning entity was destroyed.
    ///
    /// Sync records are never destroyed independently of their entity.
    pub async fn discard(&self, id: &str) -> Result<(), SyncError> {
        self.store.remove(id).await
    }

    /// The client polling contract: keep polling while the record is PENDING,
    /// or FAILED with retries still in budget. SUCCESS and DLQ stop the poll.
    pub fn should_continue_polling(&self, record: &SyncRecord) -> bool {
        match record.status {
            SyncStatus::Pending => true,
            SyncStatus::Failed => record.retry_count < self.max_retries,
            SyncStatus::Success | SyncStatus::Dlq => false,
        }
    }

    /// Per-status totals for the metrics surface.
    pub async fn status_counts(&self) -> Result<StatusCounts, SyncError> {
        self.store.status_counts().await
    }
}
