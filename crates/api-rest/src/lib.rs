//! # API REST
//!
//! REST surface for folder number allocation and NHIE sync administration.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (camelCase JSON wire fields, CORS)
//!
//! All domain behaviour lives in `ghemr-core`; the handlers here translate
//! between the wire and the services, log failures, and map domain errors to
//! status codes. Validation failures surface with a field-level message;
//! everything else is an opaque 500.

#![warn(rust_2018_idioms)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use folder_number::{current_year, FolderNumber, RegionCode, MIN_SEQUENCE};
use ghemr_core::dlq::DEFAULT_PAGE_SIZE;
use ghemr_core::memory::{
    InMemoryAllocationBackend, InMemoryCounterStore, InMemoryEntityDirectory, InMemorySyncStore,
};
use ghemr_core::{CoreConfig, DlqService, SequenceAllocator, SyncError, SyncRecord, SyncTracker};

/// Application state shared across REST API handlers.
///
/// Holds the allocator, the sync tracker, and the DLQ admin service behind
/// `Arc`s so the router can be cloned per connection.
#[derive(Clone)]
pub struct AppState {
    allocator: Arc<SequenceAllocator>,
    tracker: SyncTracker,
    dlq: DlqService,
}

impl AppState {
    /// Build state over explicitly wired services.
    pub fn new(allocator: Arc<SequenceAllocator>, tracker: SyncTracker, dlq: DlqService) -> Self {
        Self {
            allocator,
            tracker,
            dlq,
        }
    }

    /// Build a fully in-memory state for development and tests.
    ///
    /// The allocation backend, counter store, sync store, and entity
    /// directory are all process-local; nothing survives a restart.
    pub fn in_memory(cfg: &CoreConfig) -> Self {
        let allocator = Arc::new(SequenceAllocator::new(
            Arc::new(InMemoryAllocationBackend::new()),
            Arc::new(InMemoryCounterStore::new()),
            cfg.backend_timeout(),
        ));
        let sync_store = Arc::new(InMemorySyncStore::new());
        let tracker = SyncTracker::new(sync_store.clone(), cfg.max_retries());
        let dlq = DlqService::new(
            sync_store,
            tracker.clone(),
            Arc::new(InMemoryEntityDirectory::new()),
        );
        Self::new(allocator, tracker, dlq)
    }

    /// The sync tracker, for wiring a reconciliation executor.
    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        allocate_folder_number,
        next_sequence,
        sync_status,
        list_dlq,
        requeue_dlq,
        nhie_metrics,
    ),
    components(schemas(
        HealthRes,
        AllocateFolderNumberReq,
        AllocateFolderNumberRes,
        NextSequenceRes,
        SyncStatusRes,
        DlqItemRes,
        DlqListRes,
        RequeueReq,
        MetricsRes,
    ))
)]
struct ApiDoc;

/// Build the REST router over the given state.
///
/// Mounted routes mirror the admin and registration surfaces of the original
/// web application, plus Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/foldernumber/allocate", post(allocate_folder_number))
        .route("/foldernumber/next", get(next_sequence))
        .route("/patients/:id/sync-status", get(sync_status))
        .route("/nhie/dlq", get(list_dlq))
        .route("/nhie/dlq/requeue", post(requeue_dlq))
        .route("/nhie/metrics", get(nhie_metrics))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Wire types
// ============================================================================

/// Health check response.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthRes {
    /// Whether the service is up.
    pub ok: bool,
    /// Human-readable status line.
    pub message: String,
}

/// Folder number allocation request.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocateFolderNumberReq {
    /// One of the 16 Ghana region codes, e.g. `GAR`.
    pub region_code: String,
    /// Facility code, 2-10 uppercase alphanumeric characters, e.g. `KBTH`.
    pub facility_code: String,
}

/// Folder number allocation response.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocateFolderNumberRes {
    /// The issued folder number, e.g. `GAR-KBTH-2025-000123`.
    pub folder_number: String,
}

/// Query parameters for the next-sequence preview.
#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct NextSequenceQuery {
    /// One of the 16 Ghana region codes.
    pub region_code: String,
    /// Facility code.
    pub facility_code: String,
}

/// Next-sequence preview response.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextSequenceRes {
    /// The sequence the fallback path would assign next. Diagnostic only;
    /// nothing is reserved.
    pub next_sequence: u32,
}

/// NHIE synchronisation status of one patient record.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusRes {
    /// The owning patient identifier.
    pub patient_uuid: String,
    /// `PENDING`, `SUCCESS`, `FAILED`, or `DLQ`.
    pub sync_status: String,
    /// Identifier assigned by the NHIE on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nhie_patient_id: Option<String>,
    /// RFC 3339 timestamp of the most recent attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<String>,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Failure detail from the most recent attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Whether a client should keep polling this record.
    pub polling: bool,
}

/// Query parameters for the DLQ listing.
#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DlqQuery {
    /// 1-based page, defaults to 1.
    pub page: Option<usize>,
    /// Page size, defaults to 20, clamped to 1..=100.
    pub page_size: Option<usize>,
}

/// One DLQ listing entry.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqItemRes {
    /// The owning patient identifier.
    pub id: String,
    /// Display summary of the owning entity, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Failed attempts before dead-lettering.
    pub retry_count: u32,
    /// Failure detail from the final attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// RFC 3339 timestamp of the final attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<String>,
}

/// One page of DLQ listing results.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DlqListRes {
    /// The records on this page, most recently failed first.
    pub items: Vec<DlqItemRes>,
    /// Total dead-lettered records across all pages.
    pub total: u64,
    /// The 1-based page that was served.
    pub page: usize,
    /// The effective page size.
    pub page_size: usize,
}

/// Manual requeue request.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequeueReq {
    /// The owning patient identifier to requeue.
    pub id: String,
}

/// Operational counters for the NHIE integration.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRes {
    /// Allocations served by the counter-store fallback since startup. A
    /// rising value means duplicate-risk windows were open.
    pub fallback_allocations: u64,
    /// Records awaiting their first outcome.
    pub pending: u64,
    /// Records reconciled successfully.
    pub success: u64,
    /// Records with retries still in budget.
    pub failed: u64,
    /// Dead-lettered records awaiting manual intervention.
    pub dlq: u64,
}

fn sync_status_res(record: SyncRecord, polling: bool) -> SyncStatusRes {
    SyncStatusRes {
        patient_uuid: record.id,
        sync_status: record.status.as_str().to_owned(),
        nhie_patient_id: record.external_id,
        last_sync_attempt: record.last_attempt_at.map(|t| t.to_rfc3339()),
        retry_count: record.retry_count,
        error_message: record.error_message,
        polling,
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Returns the current health status of the service. Used for monitoring and
/// load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "GhEMR folder number service is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/foldernumber/allocate",
    request_body = AllocateFolderNumberReq,
    responses(
        (status = 200, description = "Folder number issued", body = AllocateFolderNumberRes),
        (status = 400, description = "Invalid region or facility code")
    )
)]
/// Allocate a folder number for a new registration
///
/// Issues the next folder number for the region/facility, using the
/// allocation backend when it is reachable and the documented best-effort
/// fallback otherwise. Backend unavailability is never surfaced here; only
/// invalid input fails the request.
///
/// # Errors
/// Returns `400 Bad Request` with a field-level message if:
/// - the region code is not one of the 16 Ghana region codes, or
/// - the facility code is not 2-10 uppercase alphanumeric characters.
#[axum::debug_handler]
async fn allocate_folder_number(
    State(state): State<AppState>,
    Json(req): Json<AllocateFolderNumberReq>,
) -> Result<Json<AllocateFolderNumberRes>, (StatusCode, String)> {
    let region = RegionCode::from_str(&req.region_code)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    match state.allocator.allocate(region, &req.facility_code).await {
        Ok(folder) => Ok(Json(AllocateFolderNumberRes {
            folder_number: folder.to_string(),
        })),
        Err(e) => {
            tracing::warn!("Folder number allocation rejected: {e}");
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/foldernumber/next",
    params(NextSequenceQuery),
    responses(
        (status = 200, description = "Next fallback sequence preview", body = NextSequenceRes),
        (status = 400, description = "Invalid region or facility code")
    )
)]
/// Preview the next fallback sequence for a prefix
///
/// Diagnostic endpoint: reports what the fallback path would assign next for
/// the current year's prefix, without reserving anything. A concurrent
/// allocation can invalidate the answer immediately.
///
/// # Errors
/// Returns `400 Bad Request` if the region or facility code is invalid.
#[axum::debug_handler]
async fn next_sequence(
    State(state): State<AppState>,
    Query(query): Query<NextSequenceQuery>,
) -> Result<Json<NextSequenceRes>, (StatusCode, String)> {
    let region = RegionCode::from_str(&query.region_code)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    FolderNumber::new(region, &query.facility_code, current_year(), MIN_SEQUENCE)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let next_sequence = state
        .allocator
        .next_sequence_preview(region, &query.facility_code)
        .await;
    Ok(Json(NextSequenceRes { next_sequence }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/sync-status",
    responses(
        (status = 200, description = "Current sync status", body = SyncStatusRes),
        (status = 404, description = "Patient not enrolled for sync"),
        (status = 500, description = "Internal server error")
    )
)]
/// Read the NHIE sync status of one patient record
///
/// The authoritative state for the registration UI's status badge. Clients
/// poll this at a fixed cadence and stop when `polling` turns false.
///
/// # Errors
/// Returns `404 Not Found` if the patient was never enrolled for sync, and
/// `500 Internal Server Error` if the sync store fails.
#[axum::debug_handler]
async fn sync_status(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<SyncStatusRes>, (StatusCode, &'static str)> {
    match state.tracker.status(&id).await {
        Ok(Some(record)) => {
            let polling = state.tracker.should_continue_polling(&record);
            Ok(Json(sync_status_res(record, polling)))
        }
        Ok(None) => Err((StatusCode::NOT_FOUND, "No sync record for patient")),
        Err(e) => {
            tracing::error!("Sync status read error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/nhie/dlq",
    params(DlqQuery),
    responses(
        (status = 200, description = "One page of dead-lettered records", body = DlqListRes),
        (status = 500, description = "Internal server error")
    )
)]
/// List dead-lettered sync records
///
/// Pure read for the admin queue screen: most recently failed first, with the
/// owning patient's display summary where the directory can resolve it.
///
/// # Errors
/// Returns `500 Internal Server Error` if the sync store fails.
#[axum::debug_handler]
async fn list_dlq(
    State(state): State<AppState>,
    Query(query): Query<DlqQuery>,
) -> Result<Json<DlqListRes>, (StatusCode, &'static str)> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    match state.dlq.list(page, page_size).await {
        Ok(result) => Ok(Json(DlqListRes {
            items: result
                .items
                .into_iter()
                .map(|item| DlqItemRes {
                    id: item.record.id,
                    summary: item.summary,
                    retry_count: item.record.retry_count,
                    error_message: item.record.error_message,
                    last_attempt_at: item.record.last_attempt_at.map(|t| t.to_rfc3339()),
                })
                .collect(),
            total: result.total,
            page: result.page,
            page_size: result.page_size,
        })),
        Err(e) => {
            tracing::error!("DLQ list error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/nhie/dlq/requeue",
    request_body = RequeueReq,
    responses(
        (status = 200, description = "Record after the requeue", body = SyncStatusRes),
        (status = 404, description = "Unknown record id"),
        (status = 500, description = "Internal server error")
    )
)]
/// Manually requeue a dead-lettered record
///
/// Applies the DLQ→PENDING transition, preserving the retry count for audit.
/// Idempotent: requeuing a record that is not dead-lettered returns it
/// unchanged, so an operator double-click is harmless.
///
/// # Errors
/// Returns `404 Not Found` for an unknown id and `500 Internal Server Error`
/// if the sync store fails.
#[axum::debug_handler]
async fn requeue_dlq(
    State(state): State<AppState>,
    Json(req): Json<RequeueReq>,
) -> Result<Json<SyncStatusRes>, (StatusCode, &'static str)> {
    match state.dlq.requeue(&req.id).await {
        Ok(record) => {
            let polling = state.tracker.should_continue_polling(&record);
            Ok(Json(sync_status_res(record, polling)))
        }
        Err(SyncError::NotFound(_)) => Err((StatusCode::NOT_FOUND, "No sync record for patient")),
        Err(e) => {
            tracing::error!("DLQ requeue error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/nhie/metrics",
    responses(
        (status = 200, description = "Operational counters", body = MetricsRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Operational counters for the NHIE integration
///
/// Fallback allocation count plus per-status sync record totals, for the
/// admin dashboard.
///
/// # Errors
/// Returns `500 Internal Server Error` if the sync store fails.
#[axum::debug_handler]
async fn nhie_metrics(
    State(state): State<AppState>,
) -> Result<Json<MetricsRes>, (StatusCode, &'static str)> {
    match state.tracker.status_counts().await {
        Ok(counts) => Ok(Json(MetricsRes {
            fallback_allocations: state.allocator.fallback_allocations(),
            pending: counts.pending,
            success: counts.success,
            failed: counts.failed,
            dlq: counts.dlq,
        })),
        Err(e) => {
            tracing::error!("Metrics read error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}
