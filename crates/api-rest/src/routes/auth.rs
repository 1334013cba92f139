//! Registration, login, logout and the current principal.

use crate::error::ApiResult;
use super::blocking;
use crate::extract::{AnyPrincipal, BearerToken, Json};
use crate::state::AppState;
use api_shared::{
    DoctorAuthRes, LoginReq, MeRes, MessageRes, PatientAuthRes, RegisterDoctorReq,
    RegisterPatientReq, ValidationErrorRes,
};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::auth::Principal;

#[utoipa::path(
    post,
    path = "/api/patient/register",
    request_body = RegisterPatientReq,
    responses(
        (status = 201, description = "Patient registered", body = PatientAuthRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    )
)]
/// Register a patient account and issue a `patient` token.
pub async fn register_patient(
    State(state): State<AppState>,
    Json(req): Json<RegisterPatientReq>,
) -> ApiResult<(StatusCode, Json<PatientAuthRes>)> {
    let auth = state.auth.clone();
    let res = blocking(move || auth.register_patient(&req)).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    post,
    path = "/api/patient/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Token issued", body = PatientAuthRes),
        (status = 401, description = "Wrong credentials", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    )
)]
pub async fn login_patient(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<PatientAuthRes>> {
    let auth = state.auth.clone();
    Ok(Json(blocking(move || auth.login_patient(&req)).await?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/register",
    request_body = RegisterDoctorReq,
    responses(
        (status = 201, description = "Doctor registered", body = DoctorAuthRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    )
)]
/// Register a doctor account and issue a `doctor` token.
pub async fn register_doctor(
    State(state): State<AppState>,
    Json(req): Json<RegisterDoctorReq>,
) -> ApiResult<(StatusCode, Json<DoctorAuthRes>)> {
    let auth = state.auth.clone();
    let res = blocking(move || auth.register_doctor(&req)).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[utoipa::path(
    post,
    path = "/api/doctor/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Token issued", body = DoctorAuthRes),
        (status = 401, description = "Wrong credentials", body = MessageRes),
        (status = 403, description = "Account inactive", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    )
)]
pub async fn login_doctor(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> ApiResult<Json<DoctorAuthRes>> {
    let auth = state.auth.clone();
    Ok(Json(blocking(move || auth.login_doctor(&req)).await?))
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Token revoked", body = MessageRes),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
/// Revoke the presented token. Other tokens of the same principal stay valid.
pub async fn logout(
    State(state): State<AppState>,
    _principal: AnyPrincipal,
    BearerToken(token): BearerToken,
) -> ApiResult<Json<MessageRes>> {
    state.auth.logout(&token)?;
    Ok(Json(MessageRes::new("Logged out successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Authenticated principal", body = MeRes),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(AnyPrincipal(principal): AnyPrincipal) -> Json<MeRes> {
    let guard = principal.guard().as_str().to_string();
    let res = match principal {
        Principal::Doctor(doctor) => MeRes {
            guard,
            doctor: Some(doctor),
            patient: None,
        },
        Principal::Patient(patient) => MeRes {
            guard,
            doctor: None,
            patient: Some(patient),
        },
    };
    Json(res)
}
