//! Request extractors.
//!
//! A handler states which guard it needs by taking [`DoctorAuth`], [`PatientAuth`],
//! [`AnyPrincipal`] or [`OptionalPrincipal`]. A token issued under the other guard is
//! rejected exactly like a missing one.
//!
//! [`Json`], [`Path`] and [`Query`] wrap axum's extractors so their rejections render
//! through [`ApiError`] as JSON.

use crate::error::ApiError;
use crate::state::AppState;
use api_shared::auth::bearer_token;
use api_shared::{Doctor, Patient};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use clinic_core::auth::Principal;
use clinic_core::ownership::Actor;
use clinic_core::ClinicError;
use serde::Serialize;

/// JSON request body; also usable as a JSON response.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

/// The raw bearer token, when the request carries one.
pub struct BearerToken(pub String);

fn token_from(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned)
}

fn resolve(parts: &Parts, state: &AppState) -> Result<Option<Principal>, ApiError> {
    match token_from(parts) {
        Some(token) => Ok(state.auth.resolve(&token)?),
        None => Ok(None),
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        token_from(parts)
            .map(BearerToken)
            .ok_or(ApiError::Core(ClinicError::Unauthenticated))
    }
}

/// Any authenticated doctor or patient.
pub struct AnyPrincipal(pub Principal);

impl AnyPrincipal {
    pub fn actor(&self) -> Actor {
        Actor::from(&self.0)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AnyPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)?
            .map(AnyPrincipal)
            .ok_or(ApiError::Core(ClinicError::Unauthenticated))
    }
}

/// The caller, if a valid token was presented. Never rejects for missing credentials.
pub struct OptionalPrincipal(pub Option<Principal>);

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalPrincipal(resolve(parts, state)?))
    }
}

/// An authenticated doctor (the `doctor` guard).
pub struct DoctorAuth(pub Doctor);

#[axum::async_trait]
impl FromRequestParts<AppState> for DoctorAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state)? {
            Some(Principal::Doctor(doctor)) => Ok(DoctorAuth(doctor)),
            _ => Err(ApiError::Core(ClinicError::Unauthenticated)),
        }
    }
}

/// An authenticated patient (the `patient` guard).
pub struct PatientAuth(pub Patient);

#[axum::async_trait]
impl FromRequestParts<AppState> for PatientAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state)? {
            Some(Principal::Patient(patient)) => Ok(PatientAuth(patient)),
            _ => Err(ApiError::Core(ClinicError::Unauthenticated)),
        }
    }
}
