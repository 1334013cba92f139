//! Consultation notes written by doctors and read by their patients.

use crate::error::ApiResult;
use crate::extract::{AnyPrincipal, DoctorAuth, Json, Path, PatientAuth};
use crate::state::AppState;
use api_shared::{Consultation, ConsultationReq, MessageRes, ValidationErrorRes};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::repositories::consultations::ConsultationService;

#[utoipa::path(
    get,
    path = "/api/doctor/consultations",
    responses(
        (status = 200, description = "The caller's consultations", body = Vec<Consultation>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_doctor(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
) -> ApiResult<Json<Vec<Consultation>>> {
    Ok(Json(ConsultationService::new(state.db.clone()).list_for_doctor(doctor.id)?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/consultations",
    request_body = ConsultationReq,
    responses(
        (status = 201, description = "Consultation recorded", body = Consultation),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Record a consultation for a patient or a guest (`guest_<id>`).
pub async fn create(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<ConsultationReq>,
) -> ApiResult<(StatusCode, Json<Consultation>)> {
    let consultation = ConsultationService::new(state.db.clone()).create(doctor.id, &req)?;
    Ok((StatusCode::CREATED, Json(consultation)))
}

#[utoipa::path(
    get,
    path = "/api/consultations/{id}",
    params(("id" = i64, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation", body = Consultation),
        (status = 403, description = "Not the caller's consultation", body = MessageRes),
        (status = 404, description = "Unknown consultation", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn show(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Consultation>> {
    let service = ConsultationService::new(state.db.clone());
    Ok(Json(service.get(principal.actor(), id)?))
}

#[utoipa::path(
    put,
    path = "/api/doctor/consultations/{id}",
    params(("id" = i64, Path, description = "Consultation id")),
    request_body = ConsultationReq,
    responses(
        (status = 200, description = "Consultation replaced", body = Consultation),
        (status = 403, description = "Another doctor's consultation", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
    Json(req): Json<ConsultationReq>,
) -> ApiResult<Json<Consultation>> {
    let service = ConsultationService::new(state.db.clone());
    Ok(Json(service.update(doctor.id, id, &req)?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/consultations/{id}",
    params(("id" = i64, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Consultation deleted", body = MessageRes),
        (status = 403, description = "Another doctor's consultation", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    ConsultationService::new(state.db.clone()).delete(doctor.id, id)?;
    Ok(Json(MessageRes::new("Consultation deleted successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/patient/consultations",
    responses(
        (status = 200, description = "The caller's consultations", body = Vec<Consultation>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_patient(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
) -> ApiResult<Json<Vec<Consultation>>> {
    Ok(Json(ConsultationService::new(state.db.clone()).list_for_patient(patient.id)?))
}
