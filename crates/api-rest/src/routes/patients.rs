//! Patient self-service: profile, password, reviews and dashboards.

use super::blocking;
use crate::error::ApiResult;
use crate::extract::{DoctorAuth, Json, Path, PatientAuth};
use crate::state::AppState;
use api_shared::{
    ChangePasswordReq, CreateReviewReq, DoctorDashboard, MessageRes, Patient, PatientDashboard,
    Review, UpdatePatientProfileReq, ValidationErrorRes,
};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::dashboard::DashboardService;
use clinic_core::repositories::patients::PatientService;
use clinic_core::repositories::reviews::ReviewService;

#[utoipa::path(
    put,
    path = "/api/patient/profile",
    request_body = UpdatePatientProfileReq,
    responses(
        (status = 200, description = "Updated profile", body = Patient),
        (status = 401, description = "Unauthenticated", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Json(req): Json<UpdatePatientProfileReq>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(PatientService::new(state.db.clone()).update_profile(patient.id, &req)?))
}

#[utoipa::path(
    put,
    path = "/api/patient/password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed", body = MessageRes),
        (status = 401, description = "Unauthenticated", body = MessageRes),
        (
            status = 422,
            description = "Current password wrong or new one invalid",
            body = ValidationErrorRes,
        )
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Json(req): Json<ChangePasswordReq>,
) -> ApiResult<Json<MessageRes>> {
    let auth = state.auth.clone();
    blocking(move || auth.change_patient_password(patient.id, &req)).await?;
    Ok(Json(MessageRes::new("Password updated successfully.")))
}

#[utoipa::path(
    post,
    path = "/api/patient/reviews",
    request_body = CreateReviewReq,
    responses(
        (status = 201, description = "Review created", body = Review),
        (
            status = 422,
            description = "Invalid rating or already reviewed",
            body = ValidationErrorRes,
        )
    ),
    security(("bearer_auth" = []))
)]
/// Review a doctor. Each patient may review a given doctor once.
pub async fn create_review(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Json(req): Json<CreateReviewReq>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = ReviewService::new(state.db.clone()).create(patient.id, &req)?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    delete,
    path = "/api/patient/reviews/{id}",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted", body = MessageRes),
        (status = 403, description = "Another patient's review", body = MessageRes),
        (status = 404, description = "Unknown review", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_review(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    ReviewService::new(state.db.clone()).delete(patient.id, id)?;
    Ok(Json(MessageRes::new("Review deleted successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/patient/dashboard",
    responses(
        (status = 200, description = "Patient counters", body = PatientDashboard),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn patient_dashboard(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
) -> ApiResult<Json<PatientDashboard>> {
    let service = DashboardService::new(state.db.clone());
    Ok(Json(service.patient(patient.id, state.today())?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/dashboard",
    responses(
        (
            status = 200,
            description = "Doctor counters and upcoming appointments",
            body = DoctorDashboard,
        ),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn doctor_dashboard(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
) -> ApiResult<Json<DoctorDashboard>> {
    let service = DashboardService::new(state.db.clone());
    Ok(Json(service.doctor(doctor.id, state.today())?))
}
