//! # GhEMR Core
//!
//! Core business logic for patient folder number allocation and NHIE
//! (National Health Information Exchange) synchronisation tracking.
//!
//! This crate contains the two consistency-critical pieces of the
//! registration system:
//! - **Sequence allocation** ([`allocator`]): mints globally-unique folder
//!   numbers through a linearizable allocation backend, degrading to a
//!   best-effort counter-store fallback when that backend is unavailable.
//! - **Sync tracking** ([`sync`]): a per-record state machine governing how a
//!   locally-created record is reconciled with the NHIE, with a bounded retry
//!   budget and a dead-letter queue for records that exhaust it.
//! - **DLQ administration** ([`dlq`]): paginated listing and manual requeue of
//!   dead-lettered records, built on the tracker.
//!
//! External collaborators (the allocation backend, the shared counter store,
//! the sync record store, and the patient directory) are reached only through
//! trait seams, so tests and development builds substitute the in-memory
//! implementations in [`memory`].
//!
//! **No API concerns**: HTTP servers, serialisation of request/response
//! bodies, and OpenAPI documentation belong in `api-rest`.

pub mod allocator;
pub mod config;
pub mod dlq;
pub mod memory;
pub mod sync;

pub use allocator::{AllocationBackend, BackendError, CounterStore, SequenceAllocator, StoreError};
pub use config::CoreConfig;
pub use dlq::{DlqItem, DlqPage, DlqService, EntityDirectory};
pub use sync::{
    AttemptOutcome, StatusCounts, SyncError, SyncRecord, SyncStatus, SyncStore, SyncTracker,
};
