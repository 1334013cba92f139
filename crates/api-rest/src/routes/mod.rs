//! Route table for the REST API.
//!
//! Public endpoints live under `/api`, doctor-guarded ones under `/api/doctor`, patient-guarded
//! ones under `/api/patient`. Resources either party may read (appointments, consultations,
//! records, prescriptions, messages) sit under `/api` and check ownership per row.

pub mod appointments;
pub mod auth;
pub mod cart;
pub mod catalogue;
pub mod consultations;
pub mod content;
pub mod doctors;
pub mod messages;
pub mod patients;
pub mod prescriptions;
pub mod records;
pub mod subscriptions;

use crate::docs::ApiDoc;
use crate::error::ApiResult;
use crate::state::AppState;
use api_shared::{HealthRes, HealthService};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use clinic_core::ClinicResult;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Run password hashing or attachment storage on the blocking pool so async workers stay
/// free for other requests.
pub(crate) async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> ClinicResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await??)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Reports process liveness for monitoring and load balancers. The database is not checked.
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

/// Build the API router: every route, Swagger UI and permissive CORS.
///
/// The SPA fallback and request tracing are added by the binary that serves it.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.cfg.max_upload_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let uploads = Router::new()
        .route(
            "/api/doctor/records",
            get(records::list_for_doctor).post(records::create),
        )
        .route(
            "/api/doctor/records/:id",
            put(records::update).delete(records::delete),
        )
        .layer(DefaultBodyLimit::max(upload_limit));

    Router::new()
        .route("/health", get(health))
        // auth
        .route("/api/patient/register", post(auth::register_patient))
        .route("/api/patient/login", post(auth::login_patient))
        .route("/api/doctor/register", post(auth::register_doctor))
        .route("/api/doctor/login", post(auth::login_doctor))
        .route("/api/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        // public directory
        .route("/api/doctors", get(doctors::list_doctors))
        .route("/api/doctors/:id", get(doctors::show_doctor))
        .route("/api/doctors/:id/slots", get(doctors::time_slots))
        .route("/api/doctors/:id/schedule", get(doctors::doctor_schedule))
        .route("/api/doctors/:id/reviews", get(doctors::doctor_reviews))
        // booking and shared reads
        .route("/api/appointments/book", post(appointments::book))
        .route("/api/appointments/:id", get(appointments::show))
        .route("/api/consultations/:id", get(consultations::show))
        .route("/api/records/:id", get(records::show))
        .route("/api/records/:id/download", get(records::download))
        .route("/api/prescriptions/:id", get(prescriptions::show))
        // doctor
        .route("/api/doctor/profile", put(doctors::update_profile))
        .route("/api/doctor/password", put(doctors::change_password))
        .route(
            "/api/doctor/schedule",
            get(doctors::my_schedule).put(doctors::replace_schedule),
        )
        .route("/api/doctor/dashboard", get(patients::doctor_dashboard))
        .route("/api/doctor/patients", get(doctors::list_patients))
        .route("/api/doctor/patients/:id", get(doctors::show_patient))
        .route("/api/doctor/guests/:id", get(doctors::show_guest))
        .route("/api/doctor/appointments", get(appointments::list_for_doctor))
        .route(
            "/api/doctor/appointments/:id",
            delete(appointments::delete),
        )
        .route(
            "/api/doctor/appointments/:id/status",
            patch(appointments::update_status),
        )
        .route(
            "/api/doctor/consultations",
            get(consultations::list_for_doctor).post(consultations::create),
        )
        .route(
            "/api/doctor/consultations/:id",
            put(consultations::update).delete(consultations::delete),
        )
        .route(
            "/api/doctor/prescriptions",
            get(prescriptions::list_for_doctor).post(prescriptions::create),
        )
        .route("/api/doctor/prescriptions/bulk", post(prescriptions::bulk_update))
        .route(
            "/api/doctor/prescriptions/subject/:identifier",
            get(prescriptions::list_for_subject),
        )
        .route(
            "/api/doctor/prescriptions/:id",
            put(prescriptions::update).delete(prescriptions::delete),
        )
        .route(
            "/api/doctor/blogs",
            get(content::my_blogs).post(content::create_blog),
        )
        .route(
            "/api/doctor/blogs/:id",
            put(content::update_blog).delete(content::delete_blog),
        )
        .route("/api/doctor/galleries", post(content::create_gallery))
        .route(
            "/api/doctor/galleries/:id",
            put(content::update_gallery).delete(content::delete_gallery),
        )
        .route("/api/doctor/medicines", post(catalogue::create_medicine))
        .route(
            "/api/doctor/medicines/:id",
            put(catalogue::update_medicine).delete(catalogue::delete_medicine),
        )
        .route("/api/doctor/tests", post(catalogue::create_test))
        .route(
            "/api/doctor/tests/:id",
            put(catalogue::update_test).delete(catalogue::delete_test),
        )
        // patient
        .route("/api/patient/profile", put(patients::update_profile))
        .route("/api/patient/password", put(patients::change_password))
        .route("/api/patient/dashboard", get(patients::patient_dashboard))
        .route("/api/patient/appointments", get(appointments::list_for_patient))
        .route(
            "/api/patient/appointments/:id/cancel",
            post(appointments::cancel),
        )
        .route(
            "/api/patient/consultations",
            get(consultations::list_for_patient),
        )
        .route("/api/patient/records", get(records::list_for_patient))
        .route(
            "/api/patient/prescriptions",
            get(prescriptions::list_for_patient),
        )
        .route("/api/patient/reviews", post(patients::create_review))
        .route("/api/patient/reviews/:id", delete(patients::delete_review))
        .route("/api/patient/cart", get(cart::show).delete(cart::clear))
        .route("/api/patient/cart/items", post(cart::add))
        .route(
            "/api/patient/cart/items/:id",
            put(cart::update).delete(cart::remove),
        )
        // messages
        .route("/api/messages", get(messages::inbox).post(messages::send))
        .route(
            "/api/messages/conversation/:type/:id",
            get(messages::conversation),
        )
        .route("/api/messages/:id/read", post(messages::mark_read))
        // content and catalogue
        .route("/api/blogs", get(content::list_blogs))
        .route("/api/blogs/:slug", get(content::show_blog))
        .route("/api/galleries", get(content::list_galleries))
        .route("/api/galleries/:id", get(content::show_gallery))
        .route("/api/medicines", get(catalogue::list_medicines))
        .route("/api/medicines/:id", get(catalogue::show_medicine))
        .route("/api/tests", get(catalogue::list_tests))
        .route("/api/tests/:id", get(catalogue::show_test))
        .route("/api/subscriptions", post(subscriptions::subscribe))
        .route(
            "/api/subscriptions/unsubscribe",
            post(subscriptions::unsubscribe),
        )
        .merge(uploads)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_shared::RegisterDoctorReq;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use clinic_core::{CoreConfig, Database};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn setup() -> (TempDir, AppState, Router) {
        let temp = TempDir::new().unwrap();
        let cfg = CoreConfig::new(
            temp.path().join("clinic.db"),
            temp.path().join("uploads"),
            temp.path().join("public"),
            None,
            1024 * 1024,
        )
        .unwrap();
        let state = AppState::new(cfg, Database::open_in_memory().unwrap()).unwrap();
        let app = build_router(state.clone());
        (temp, state, app)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    fn doctor_token(state: &AppState, email: &str) -> (i64, String) {
        let res = state
            .auth
            .register_doctor(&RegisterDoctorReq {
                name: Some("Dr Who".into()),
                email: Some(email.into()),
                password: Some("sonic screwdriver".into()),
                password_confirmation: Some("sonic screwdriver".into()),
                specialization: Some("General Practice".into()),
                ..Default::default()
            })
            .unwrap();
        (res.doctor.id, res.token)
    }

    async fn patient_token(app: &Router, email: &str) -> (i64, String) {
        let (status, json) = call(
            app,
            Method::POST,
            "/api/patient/register",
            None,
            Some(json!({
                "name": "Rose Tyler",
                "email": email,
                "password": "bad wolf bay",
                "password_confirmation": "bad wolf bay",
                "phone": "+44 20 7946 0001"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        (
            json["patient"]["id"].as_i64().unwrap(),
            json["token"].as_str().unwrap().to_string(),
        )
    }

    fn future_date(days: i64) -> String {
        (chrono::Local::now().date_naive() + chrono::Duration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (_temp, _state, app) = setup();
        let (status, json) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn guards_reject_missing_and_foreign_tokens() {
        let (_temp, state, app) = setup();
        let (_patient_id, patient) = patient_token(&app, "rose@example.com").await;
        let (_doctor_id, doctor) = doctor_token(&state, "who@example.com");

        let (status, json) = call(&app, Method::GET, "/api/me", Some(&patient), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["guard"], "patient");

        let (status, _) = call(&app, Method::GET, "/api/doctor/dashboard", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            call(&app, Method::GET, "/api/doctor/dashboard", Some(&patient), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            call(&app, Method::GET, "/api/patient/dashboard", Some(&doctor), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            call(&app, Method::GET, "/api/doctor/dashboard", Some(&doctor), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let (_temp, _state, app) = setup();
        let (_id, token) = patient_token(&app, "martha@example.com").await;

        let (status, _) = call(&app, Method::POST, "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn validation_failures_return_field_errors() {
        let (_temp, _state, app) = setup();
        let (status, json) =
            call(&app, Method::POST, "/api/patient/register", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["message"], "The given data was invalid.");
        assert!(json["errors"]["email"].is_array());
        assert!(json["errors"]["password"].is_array());
    }

    #[tokio::test]
    async fn booking_dispatches_on_the_token() {
        let (_temp, state, app) = setup();
        let (doctor_id, doctor) = doctor_token(&state, "who@example.com");
        let (patient_id, patient) = patient_token(&app, "rose@example.com").await;
        let date = future_date(14);

        let guest = json!({
            "doctor_id": doctor_id,
            "date": date,
            "time": "10:00",
            "terms": true,
            "name": "Walk In",
            "email": "walkin@example.com",
            "phone": "(555) 123-4567",
            "date_of_birth": "1985-03-04"
        });
        let (status, json) =
            call(&app, Method::POST, "/api/appointments/book", None, Some(guest.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["booked_as"], "guest");
        assert!(json["appointment"]["guest_id"].is_i64());

        // A doctor token does not make the caller a patient.
        let mut second = guest;
        second["time"] = json!("10:30");
        let (status, json) =
            call(&app, Method::POST, "/api/appointments/book", Some(&doctor), Some(second)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["booked_as"], "guest");

        let booking = json!({"doctor_id": doctor_id, "date": date, "time": "11:00", "terms": true});
        let (status, json) = call(
            &app,
            Method::POST,
            "/api/appointments/book",
            Some(&patient),
            Some(booking.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["booked_as"], "patient");
        assert_eq!(json["appointment"]["patient_id"], patient_id);
        assert_eq!(json["appointment"]["name"], "Rose Tyler");

        let (status, json) =
            call(&app, Method::POST, "/api/appointments/book", Some(&patient), Some(booking)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["errors"].is_object());

        let uri = format!("/api/doctors/{doctor_id}/slots?date={date}");
        let (status, json) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["date"], date);
    }

    #[tokio::test]
    async fn stale_or_unknown_tokens_book_as_guest() {
        let (_temp, state, app) = setup();
        let (doctor_id, _doctor) = doctor_token(&state, "who@example.com");
        let (_patient_id, patient) = patient_token(&app, "rose@example.com").await;
        state
            .db
            .lock()
            .unwrap()
            .execute(
                "UPDATE access_tokens SET expires_at = '2000-01-01T00:00:00Z'
                 WHERE guard = 'patient'",
                [],
            )
            .unwrap();

        let guest = |time: &str| {
            json!({
                "doctor_id": doctor_id,
                "date": future_date(7),
                "time": time,
                "terms": true,
                "name": "Walk In",
                "email": "walkin@example.com",
                "phone": "(555) 123-4567",
                "date_of_birth": "1985-03-04"
            })
        };
        for (token, time) in [(patient.as_str(), "09:00"), ("not-a-real-token", "09:30")] {
            let (status, json) = call(
                &app,
                Method::POST,
                "/api/appointments/book",
                Some(token),
                Some(guest(time)),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(json["booked_as"], "guest");
            assert!(json["appointment"]["patient_id"].is_null());
        }
    }

    #[tokio::test]
    async fn malformed_requests_get_json_errors() {
        let (_temp, state, app) = setup();
        let (_doctor_id, _doctor) = doctor_token(&state, "who@example.com");

        let mistyped = json!({"doctor_id": "5", "date": future_date(3), "time": "10:00"});
        let (status, json) =
            call(&app, Method::POST, "/api/appointments/book", None, Some(mistyped)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["message"], "The given data was invalid.");
        assert!(json["errors"]["doctor_id"].is_array());

        let (status, json) = call(&app, Method::GET, "/api/doctors/abc", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["message"].is_string());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/patient/login")
            .body(Body::from(r#"{"email":"rose@example.com"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn other_doctors_get_403() {
        let (_temp, state, app) = setup();
        let (_owner_id, owner) = doctor_token(&state, "owner@example.com");
        let (_other_id, other) = doctor_token(&state, "other@example.com");
        let (patient_id, patient) = patient_token(&app, "rose@example.com").await;

        let (status, json) = call(
            &app,
            Method::POST,
            "/api/doctor/prescriptions",
            Some(&owner),
            Some(json!({
                "patient_id": patient_id.to_string(),
                "diagnosis": "Sinusitis",
                "medicines": [{
                    "name": "Amoxicillin",
                    "dosage": "500 mg",
                    "frequency": "Three times daily",
                    "duration": "7 days"
                }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json["id"].as_i64().unwrap();
        assert_eq!(json["medicines"].as_array().unwrap().len(), 1);

        let uri = format!("/api/doctor/prescriptions/{id}");
        let (status, _) = call(&app, Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/prescriptions/{id}");
        let (status, _) = call(&app, Method::GET, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json) = call(&app, Method::GET, &uri, Some(&patient), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["diagnosis"], "Sinusitis");

        let (status, json) = call(
            &app,
            Method::POST,
            "/api/doctor/prescriptions/bulk",
            Some(&other),
            Some(json!({"ids": [id], "action": "deactivate"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["affected"], 0);

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/prescriptions/9999",
            Some(&owner),
            None,
        ).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn record_upload_and_download() {
        let (_temp, state, app) = setup();
        let (_doctor_id, doctor) = doctor_token(&state, "who@example.com");
        let (patient_id, patient) = patient_token(&app, "rose@example.com").await;

        let boundary = "clinic-test-boundary";
        let mut body = Vec::new();
        for (name, value) in [
            ("patient_id", patient_id.to_string()),
            ("title", "Chest X-ray".to_string()),
            ("record_type", "imaging".to_string()),
            ("record_date", "2026-01-10".to_string()),
        ] {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; \
                     name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"xray.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(PNG);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/doctor/records")
            .header(header::AUTHORIZATION, format!("Bearer {doctor}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let record: Value = serde_json::from_slice(&bytes).unwrap();
        let id = record["id"].as_i64().unwrap();
        assert_eq!(record["attachment"]["file_name"], "xray.png");

        let request = Request::builder()
            .uri(format!("/api/records/{id}/download"))
            .header(header::AUTHORIZATION, format!("Bearer {patient}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"xray.png\""
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], PNG);
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected_with_413() {
        let (_temp, state, app) = setup();
        let (_doctor_id, doctor) = doctor_token(&state, "who@example.com");

        let boundary = "clinic-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"big.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        // Past the 1 MiB attachment limit plus the multipart allowance.
        body.extend(std::iter::repeat(b'x').take(3 * 1024 * 1024));
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/doctor/records")
            .header(header::AUTHORIZATION, format!("Bearer {doctor}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (_temp, _state, app) = setup();
        let (status, json) = call(&app, Method::GET, "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["paths"]["/api/appointments/book"].is_object());
        assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
