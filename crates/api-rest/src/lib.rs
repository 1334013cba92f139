//! # API REST
//!
//! REST API implementation for the clinic backend.
//!
//! Handles:
//! - HTTP endpoints with axum, guarded by bearer tokens ([`extract`])
//! - Mapping core errors onto status codes and JSON bodies ([`error`])
//! - OpenAPI/Swagger documentation
//! - Serving the single-page front end for unknown paths
//!
//! Uses `api-shared` for wire types and `clinic-core` for every rule.

#![warn(rust_2018_idioms)]

mod docs;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use docs::ApiDoc;
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;

use axum::Router;
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// Serve files from `public_dir` for any path no route matched, falling back to
/// `index.html` so client-side routes resolve.
pub fn with_spa_fallback(router: Router, public_dir: &Path) -> Router {
    let index = public_dir.join("index.html");
    router.fallback_service(ServeDir::new(public_dir).fallback(ServeFile::new(index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use clinic_core::{CoreConfig, Database};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn unknown_paths_fall_back_to_the_front_end() {
        let temp = TempDir::new().unwrap();
        let public = temp.path().join("public");
        std::fs::create_dir_all(&public).unwrap();
        std::fs::write(public.join("index.html"), "<div id=\"app\"></div>").unwrap();
        std::fs::write(public.join("app.js"), "console.log('clinic')").unwrap();

        let cfg = CoreConfig::new(
            temp.path().join("clinic.db"),
            temp.path().join("uploads"),
            public.clone(),
            None,
            1024,
        )
        .unwrap();
        let state = AppState::new(cfg, Database::open_in_memory().unwrap()).unwrap();
        let app = with_spa_fallback(build_router(state), &public);

        let (status, body) = get(&app, "/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("clinic"));

        let (status, body) = get(&app, "/patient/appointments").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("id=\"app\""));

        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("alive"));
    }
}
