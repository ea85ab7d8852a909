//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, over fully in-memory collaborators.
//!
//! ## Intended use
//! Development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI) and default policy. The workspace's main `ghemr-run`
//! binary resolves the full environment configuration.

use api_rest::AppState;
use ghemr_core::CoreConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the standalone REST API server
///
/// Starts the REST API server on the configured address (default:
/// 0.0.0.0:3000) with default core policy and in-memory collaborators.
///
/// # Environment Variables
/// - `GHEMR_REST_ADDR`: Server address (default: "0.0.0.0:3000")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("GHEMR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting GhEMR REST API on {}", addr);

    let state = AppState::in_memory(&CoreConfig::default());
    let app = api_rest::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
