//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API (with OpenAPI/Swagger UI) without the front-end fallback.
//!
//! ## Intended use
//! Useful for development and debugging against the API alone. The workspace's main
//! `clinic-run` binary also serves the single-page front end.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{build_router, AppState};
use clinic_core::{config, Database};
use tower_http::trace::TraceLayer;

/// Main entry point for the clinic REST API server
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLINIC_DATABASE_PATH`, `CLINIC_UPLOAD_DIR`, `CLINIC_TOKEN_TTL_HOURS`,
///   `CLINIC_MAX_UPLOAD_BYTES`: see `clinic_core::config`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration values cannot be parsed,
/// - the database cannot be opened or migrated,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = config::from_environment()?;
    let db = Database::open(cfg.database_path())?;
    let state = AppState::new(cfg, db)?;

    let app = build_router(state).layer(TraceLayer::new_for_http());

    tracing::info!("-- Starting clinic REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
