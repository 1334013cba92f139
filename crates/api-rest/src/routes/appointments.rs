//! Booking and the appointment lifecycle.

use crate::error::ApiResult;
use crate::extract::{
    AnyPrincipal, DoctorAuth, Json, OptionalPrincipal, Path, PatientAuth, Query,
};
use crate::state::AppState;
use api_shared::{
    Appointment, AppointmentQuery, BookAppointmentReq, BookAppointmentRes, MessageRes,
    UpdateAppointmentStatusReq, ValidationErrorRes,
};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::auth::Principal;
use clinic_core::booking::{Booker, BookingService};
use clinic_core::repositories::appointments::AppointmentService;

#[utoipa::path(
    post,
    path = "/api/appointments/book",
    request_body = BookAppointmentReq,
    responses(
        (status = 201, description = "Appointment booked", body = BookAppointmentRes),
        (
            status = 422,
            description = "Validation failed or duplicate booking",
            body = ValidationErrorRes,
        ),
        (status = 500, description = "Booking transaction failed", body = MessageRes)
    ),
    security((), ("bearer_auth" = []))
)]
/// Book an appointment.
///
/// A `patient` token books for that patient, copying their contact details. Any other
/// caller, including an anonymous one, books as a guest and must supply contact fields.
pub async fn book(
    State(state): State<AppState>,
    OptionalPrincipal(principal): OptionalPrincipal,
    Json(req): Json<BookAppointmentReq>,
) -> ApiResult<(StatusCode, Json<BookAppointmentRes>)> {
    let booker = match &principal {
        Some(Principal::Patient(patient)) => Booker::Patient(patient),
        _ => Booker::Guest,
    };
    let res = BookingService::new(state.db.clone()).book(booker, &req, state.today())?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment", body = Appointment),
        (status = 403, description = "Not the caller's appointment", body = MessageRes),
        (status = 404, description = "Unknown appointment", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn show(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Appointment>> {
    let service = AppointmentService::new(state.db.clone());
    Ok(Json(service.get(principal.actor(), id)?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/appointments",
    params(AppointmentQuery),
    responses(
        (status = 200, description = "The caller's appointments", body = Vec<Appointment>),
        (status = 401, description = "Unauthenticated", body = MessageRes),
        (status = 422, description = "Bad filter", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_doctor(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let service = AppointmentService::new(state.db.clone());
    Ok(Json(service.list_for_doctor(doctor.id, &query)?))
}

#[utoipa::path(
    patch,
    path = "/api/doctor/appointments/{id}/status",
    params(("id" = i64, Path, description = "Appointment id")),
    request_body = UpdateAppointmentStatusReq,
    responses(
        (status = 200, description = "Status changed", body = Appointment),
        (status = 403, description = "Another doctor's appointment", body = MessageRes),
        (status = 404, description = "Unknown appointment", body = MessageRes),
        (status = 422, description = "Disallowed transition", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAppointmentStatusReq>,
) -> ApiResult<Json<Appointment>> {
    let service = AppointmentService::new(state.db.clone());
    Ok(Json(service.update_status(doctor.id, id, &req)?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/appointments/{id}",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment deleted", body = MessageRes),
        (status = 403, description = "Another doctor's appointment", body = MessageRes),
        (status = 422, description = "Appointment is not cancelled", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Delete an appointment. Only cancelled appointments may be removed.
pub async fn delete(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    AppointmentService::new(state.db.clone()).delete(doctor.id, id)?;
    Ok(Json(MessageRes::new("Appointment deleted successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/patient/appointments",
    params(AppointmentQuery),
    responses(
        (status = 200, description = "The caller's appointments", body = Vec<Appointment>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_patient(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let service = AppointmentService::new(state.db.clone());
    Ok(Json(service.list_for_patient(patient.id, &query)?))
}

#[utoipa::path(
    post,
    path = "/api/patient/appointments/{id}/cancel",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment cancelled", body = Appointment),
        (status = 403, description = "Not the caller's appointment", body = MessageRes),
        (status = 422, description = "Appointment already closed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Appointment>> {
    Ok(Json(AppointmentService::new(state.db.clone()).cancel(patient.id, id)?))
}
