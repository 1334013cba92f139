//! Public doctor directory plus the doctor's own profile, schedule and patient lookups.

use super::blocking;
use crate::error::ApiResult;
use crate::extract::{DoctorAuth, Json, Path, Query};
use crate::state::AppState;
use api_shared::{
    ChangePasswordReq, Doctor, DoctorQuery, Guest, MessageRes, Patient, ReplaceScheduleReq,
    Review, ScheduleRes, SlotQuery, TimeSlotsRes, UpdateDoctorProfileReq, ValidationErrorRes,
};
use axum::extract::State;
use clinic_core::repositories::doctors::DoctorService;
use clinic_core::repositories::guests::GuestService;
use clinic_core::repositories::patients::PatientService;
use clinic_core::repositories::reviews::ReviewService;
use clinic_core::schedules::ScheduleService;

#[utoipa::path(
    get,
    path = "/api/doctors",
    params(DoctorQuery),
    responses(
        (status = 200, description = "Active doctors", body = Vec<Doctor>)
    )
)]
/// List active doctors, optionally filtered by specialization or name.
pub async fn list_doctors(
    State(state): State<AppState>,
    Query(query): Query<DoctorQuery>,
) -> ApiResult<Json<Vec<Doctor>>> {
    Ok(Json(DoctorService::new(state.db.clone()).list(&query)?))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}",
    params(("id" = i64, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Doctor profile with rating summary", body = Doctor),
        (status = 404, description = "Unknown or inactive doctor", body = MessageRes)
    )
)]
pub async fn show_doctor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Doctor>> {
    Ok(Json(DoctorService::new(state.db.clone()).get_public(id)?))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}/slots",
    params(("id" = i64, Path, description = "Doctor id"), SlotQuery),
    responses(
        (status = 200, description = "Bookable slots for the date", body = TimeSlotsRes),
        (status = 404, description = "Unknown or inactive doctor", body = MessageRes),
        (status = 422, description = "Missing or malformed date", body = ValidationErrorRes)
    )
)]
/// Time slots for one date. Booked times are reported as unavailable.
pub async fn time_slots(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<SlotQuery>,
) -> ApiResult<Json<TimeSlotsRes>> {
    let service = ScheduleService::new(state.db.clone());
    Ok(Json(service.time_slots(id, query.date.as_deref(), state.today())?))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}/schedule",
    params(("id" = i64, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Weekly schedule", body = ScheduleRes),
        (status = 404, description = "Unknown doctor", body = MessageRes)
    )
)]
pub async fn doctor_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ScheduleRes>> {
    Ok(Json(ScheduleService::new(state.db.clone()).get(id)?))
}

#[utoipa::path(
    get,
    path = "/api/doctors/{id}/reviews",
    params(("id" = i64, Path, description = "Doctor id")),
    responses(
        (status = 200, description = "Reviews, newest first", body = Vec<Review>)
    )
)]
pub async fn doctor_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(ReviewService::new(state.db.clone()).list_for_doctor(id)?))
}

#[utoipa::path(
    put,
    path = "/api/doctor/profile",
    request_body = UpdateDoctorProfileReq,
    responses(
        (status = 200, description = "Updated profile", body = Doctor),
        (status = 401, description = "Unauthenticated", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<UpdateDoctorProfileReq>,
) -> ApiResult<Json<Doctor>> {
    Ok(Json(DoctorService::new(state.db.clone()).update_profile(doctor.id, &req)?))
}

#[utoipa::path(
    put,
    path = "/api/doctor/password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed", body = MessageRes),
        (status = 401, description = "Unauthenticated", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<ChangePasswordReq>,
) -> ApiResult<Json<MessageRes>> {
    let auth = state.auth.clone();
    blocking(move || auth.change_doctor_password(doctor.id, &req)).await?;
    Ok(Json(MessageRes::new("Password updated successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/doctor/schedule",
    responses(
        (status = 200, description = "The caller's weekly schedule", body = ScheduleRes),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_schedule(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
) -> ApiResult<Json<ScheduleRes>> {
    Ok(Json(ScheduleService::new(state.db.clone()).get(doctor.id)?))
}

#[utoipa::path(
    put,
    path = "/api/doctor/schedule",
    request_body = ReplaceScheduleReq,
    responses(
        (status = 200, description = "Schedule replaced", body = ScheduleRes),
        (status = 401, description = "Unauthenticated", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Replace the whole weekly schedule. Days not listed become unavailable.
pub async fn replace_schedule(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<ReplaceScheduleReq>,
) -> ApiResult<Json<ScheduleRes>> {
    Ok(Json(ScheduleService::new(state.db.clone()).replace(doctor.id, &req)?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/patients",
    responses(
        (status = 200, description = "Registered patients", body = Vec<Patient>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_patients(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
) -> ApiResult<Json<Vec<Patient>>> {
    Ok(Json(PatientService::new(state.db.clone()).list()?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/patients/{id}",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient profile", body = Patient),
        (status = 404, description = "Unknown patient", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn show_patient(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Patient>> {
    Ok(Json(PatientService::new(state.db.clone()).get(id)?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/guests/{id}",
    params(("id" = i64, Path, description = "Guest id")),
    responses(
        (status = 200, description = "Guest contact details", body = Guest),
        (status = 403, description = "Guest never booked with the caller", body = MessageRes),
        (status = 404, description = "Unknown guest", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn show_guest(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Guest>> {
    Ok(Json(GuestService::new(state.db.clone()).get_for_doctor(doctor.id, id)?))
}
