//! Newsletter subscriptions.

use crate::error::ApiResult;
use crate::extract::Json;
use crate::state::AppState;
use api_shared::{MessageRes, SubscribeReq, Subscription, ValidationErrorRes};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::repositories::subscriptions::SubscriptionService;
use clinic_core::ClinicError;

#[utoipa::path(
    post,
    path = "/api/subscriptions",
    request_body = SubscribeReq,
    responses(
        (status = 201, description = "Subscribed", body = Subscription),
        (
            status = 422,
            description = "Invalid or already subscribed e-mail",
            body = ValidationErrorRes,
        )
    )
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeReq>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    let subscription = SubscriptionService::new(state.db.clone()).subscribe(&req)?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/unsubscribe",
    request_body = SubscribeReq,
    responses(
        (status = 200, description = "Unsubscribed", body = MessageRes),
        (status = 404, description = "E-mail not subscribed", body = MessageRes),
        (status = 422, description = "E-mail missing", body = ValidationErrorRes)
    )
)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeReq>,
) -> ApiResult<Json<MessageRes>> {
    let Some(email) = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) else {
        return Err(ClinicError::field("email", "The email field is required.").into());
    };
    SubscriptionService::new(state.db.clone()).unsubscribe(email)?;
    Ok(Json(MessageRes::new("You have been unsubscribed.")))
}
