use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{build_router, with_spa_fallback, AppState};
use clinic_core::{config, Database};

/// Main entry point for the clinic application
///
/// Serves the REST API, Swagger UI and the single-page front end from one listener:
/// - `/api/*` and `/health` are handled by the API router
/// - `/swagger-ui` and `/api-docs/openapi.json` document it
/// - any other path is served from `CLINIC_PUBLIC_DIR`, falling back to `index.html`
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: listen address (default: "0.0.0.0:3000")
/// - `CLINIC_DATABASE_PATH`: SQLite database file (default: "clinic.db")
/// - `CLINIC_UPLOAD_DIR`: medical record attachments (default: "storage/medical_records")
/// - `CLINIC_PUBLIC_DIR`: front-end build (default: "public")
/// - `CLINIC_TOKEN_TTL_HOURS`: token lifetime, unset or 0 for no expiry
/// - `CLINIC_MAX_UPLOAD_BYTES`: attachment size limit (default: 10 MiB)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, database setup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr: SocketAddr = std::env::var("CLINIC_REST_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()?;

    let cfg = config::from_environment()?;
    let public_dir = cfg.public_dir().to_path_buf();
    if !public_dir.join("index.html").is_file() {
        tracing::warn!(
            "No index.html in {}; unknown paths will return 404",
            public_dir.display()
        );
    }

    let db = Database::open(cfg.database_path())?;
    tracing::info!("++ Database ready at {}", cfg.database_path().display());
    let state = AppState::new(cfg, db)?;

    let app = with_spa_fallback(build_router(state), &public_dir).layer(TraceLayer::new_for_http());

    tracing::info!("++ Starting clinic REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
