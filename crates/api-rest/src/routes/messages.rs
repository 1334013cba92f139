//! Direct messages between doctors and patients.

use crate::error::ApiResult;
use crate::extract::{AnyPrincipal, Json, Path};
use crate::state::AppState;
use api_shared::{Message, MessageRes, SendMessageReq, ValidationErrorRes};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::repositories::messages::MessageService;

#[utoipa::path(
    get,
    path = "/api/messages",
    responses(
        (
            status = 200,
            description = "Messages to or from the caller, newest first",
            body = Vec<Message>,
        ),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn inbox(
    State(state): State<AppState>,
    principal: AnyPrincipal,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(MessageService::new(state.db.clone()).inbox(principal.actor())?))
}

#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = SendMessageReq,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 422, description = "Unknown receiver or invalid body", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn send(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Json(req): Json<SendMessageReq>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = MessageService::new(state.db.clone()).send(principal.actor(), &req)?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/api/messages/conversation/{type}/{id}",
    params(
        ("type" = String, Path, description = "`doctor` or `patient`"),
        ("id" = i64, Path, description = "Counterpart id")
    ),
    responses(
        (
            status = 200,
            description = "Both directions of the thread, oldest first",
            body = Vec<Message>,
        ),
        (status = 422, description = "Unknown counterpart type", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn conversation(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path((counterpart_type, counterpart_id)): Path<(String, i64)>,
) -> ApiResult<Json<Vec<Message>>> {
    let service = MessageService::new(state.db.clone());
    Ok(Json(service.conversation(principal.actor(), &counterpart_type, counterpart_id)?))
}

#[utoipa::path(
    post,
    path = "/api/messages/{id}/read",
    params(("id" = i64, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message marked read", body = Message),
        (status = 403, description = "Caller is not the receiver", body = MessageRes),
        (status = 404, description = "Unknown message", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path(id): Path<i64>,
) -> ApiResult<Json<Message>> {
    Ok(Json(MessageService::new(state.db.clone()).mark_read(principal.actor(), id)?))
}
