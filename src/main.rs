use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use ghemr_core::config::{backend_timeout_from_env_value, max_retries_from_env_value};
use ghemr_core::CoreConfig;

/// Main entry point for the GhEMR folder number and sync service
///
/// Resolves configuration from the environment, wires the in-memory
/// collaborators, and serves the REST API (with OpenAPI/Swagger
/// documentation). Production deployments replace the in-memory
/// collaborators with adapters for the facility's allocation backend,
/// settings store, and EMR database at the trait seams in `ghemr-core`.
///
/// # Environment Variables
/// - `GHEMR_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `GHEMR_MAX_RETRIES`: Retry budget before dead-lettering (default: 8)
/// - `GHEMR_BACKEND_TIMEOUT_MS`: Upper bound on one backend/store call
///   (default: 3000)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup, or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ghemr=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("GHEMR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let max_retries = max_retries_from_env_value(std::env::var("GHEMR_MAX_RETRIES").ok())?;
    let backend_timeout =
        backend_timeout_from_env_value(std::env::var("GHEMR_BACKEND_TIMEOUT_MS").ok())?;
    let cfg = CoreConfig::new(max_retries, backend_timeout)?;

    tracing::info!("++ Starting GhEMR REST on {}", rest_addr);
    tracing::info!(
        max_retries = cfg.max_retries(),
        backend_timeout_ms = cfg.backend_timeout().as_millis() as u64,
        "resolved core configuration"
    );

    let state = AppState::in_memory(&cfg);
    let app = api_rest::router(state);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
