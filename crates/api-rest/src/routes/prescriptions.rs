//! Prescriptions with medicine and test line items.

use crate::error::ApiResult;
use crate::extract::{AnyPrincipal, DoctorAuth, Json, Path, PatientAuth};
use crate::state::AppState;
use api_shared::{
    BulkPrescriptionReq, BulkPrescriptionRes, CreatePrescriptionReq, MessageRes, Prescription,
    UpdatePrescriptionReq, ValidationErrorRes,
};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::identity::SubjectRef;
use clinic_core::repositories::prescriptions::PrescriptionService;
use clinic_core::ClinicError;

#[utoipa::path(
    get,
    path = "/api/doctor/prescriptions",
    responses(
        (
            status = 200,
            description = "Prescriptions written by the caller",
            body = Vec<Prescription>,
        ),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_doctor(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
) -> ApiResult<Json<Vec<Prescription>>> {
    Ok(Json(PrescriptionService::new(state.db.clone()).list_for_doctor(doctor.id)?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/prescriptions/subject/{identifier}",
    params(("identifier" = String, Path, description = "Patient id or `guest_<id>`")),
    responses(
        (
            status = 200,
            description = "The caller's prescriptions for one subject",
            body = Vec<Prescription>,
        ),
        (status = 404, description = "Malformed identifier", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_subject(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(identifier): Path<String>,
) -> ApiResult<Json<Vec<Prescription>>> {
    let subject = SubjectRef::parse(&identifier).ok_or(ClinicError::NotFound("patient"))?;
    let service = PrescriptionService::new(state.db.clone());
    Ok(Json(service.list_for_subject(doctor.id, subject)?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/prescriptions",
    request_body = CreatePrescriptionReq,
    responses(
        (status = 201, description = "Prescription and line items created", body = Prescription),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Create a prescription and its line items in one transaction.
///
/// `patient_id` is an identifier string: `guest_<id>` targets a guest, a bare id a
/// registered patient.
pub async fn create(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<CreatePrescriptionReq>,
) -> ApiResult<(StatusCode, Json<Prescription>)> {
    let service = PrescriptionService::new(state.db.clone());
    let prescription = service.create(doctor.id, &req, state.today())?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

#[utoipa::path(
    post,
    path = "/api/doctor/prescriptions/bulk",
    request_body = BulkPrescriptionReq,
    responses(
        (status = 200, description = "Number of prescriptions changed", body = BulkPrescriptionRes),
        (status = 422, description = "No ids or unknown action", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Activate, deactivate or delete several prescriptions. Ids the caller does not own are
/// skipped.
pub async fn bulk_update(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<BulkPrescriptionReq>,
) -> ApiResult<Json<BulkPrescriptionRes>> {
    Ok(Json(PrescriptionService::new(state.db.clone()).bulk_update(doctor.id, &req)?))
}

#[utoipa::path(
    put,
    path = "/api/doctor/prescriptions/{id}",
    params(("id" = i64, Path, description = "Prescription id")),
    request_body = UpdatePrescriptionReq,
    responses(
        (status = 200, description = "Prescription updated", body = Prescription),
        (status = 403, description = "Another doctor's prescription", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePrescriptionReq>,
) -> ApiResult<Json<Prescription>> {
    let service = PrescriptionService::new(state.db.clone());
    Ok(Json(service.update(doctor.id, id, &req, state.today())?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/prescriptions/{id}",
    params(("id" = i64, Path, description = "Prescription id")),
    responses(
        (status = 200, description = "Prescription and line items deleted", body = MessageRes),
        (status = 403, description = "Another doctor's prescription", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    PrescriptionService::new(state.db.clone()).delete(doctor.id, id)?;
    Ok(Json(MessageRes::new("Prescription deleted successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/patient/prescriptions",
    responses(
        (status = 200, description = "The caller's prescriptions", body = Vec<Prescription>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_patient(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
) -> ApiResult<Json<Vec<Prescription>>> {
    Ok(Json(PrescriptionService::new(state.db.clone()).list_for_patient(patient.id)?))
}

#[utoipa::path(
    get,
    path = "/api/prescriptions/{id}",
    params(("id" = i64, Path, description = "Prescription id")),
    responses(
        (status = 200, description = "Prescription with line items", body = Prescription),
        (status = 403, description = "Not the caller's prescription", body = MessageRes),
        (status = 404, description = "Unknown prescription", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn show(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Prescription>> {
    let service = PrescriptionService::new(state.db.clone());
    Ok(Json(service.get(principal.actor(), id)?))
}
