//! The patient's medicine cart.

use crate::error::ApiResult;
use crate::extract::{Json, Path, PatientAuth};
use crate::state::AppState;
use api_shared::{AddCartItemReq, Cart, MessageRes, UpdateCartItemReq, ValidationErrorRes};
use axum::extract::State;
use clinic_core::repositories::cart::CartService;

#[utoipa::path(
    get,
    path = "/api/patient/cart",
    responses(
        (status = 200, description = "Cart with line totals", body = Cart),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn show(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
) -> ApiResult<Json<Cart>> {
    Ok(Json(CartService::new(state.db.clone()).get(patient.id)?))
}

#[utoipa::path(
    post,
    path = "/api/patient/cart/items",
    request_body = AddCartItemReq,
    responses(
        (status = 200, description = "Cart after adding the medicine", body = Cart),
        (status = 422, description = "Unknown medicine or bad quantity", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Add a medicine. Adding one already in the cart increases its quantity.
pub async fn add(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Json(req): Json<AddCartItemReq>,
) -> ApiResult<Json<Cart>> {
    Ok(Json(CartService::new(state.db.clone()).add(patient.id, &req)?))
}

#[utoipa::path(
    put,
    path = "/api/patient/cart/items/{id}",
    params(("id" = i64, Path, description = "Cart line id")),
    request_body = UpdateCartItemReq,
    responses(
        (status = 200, description = "Cart after the change", body = Cart),
        (status = 403, description = "Another patient's line", body = MessageRes),
        (status = 422, description = "Bad quantity", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCartItemReq>,
) -> ApiResult<Json<Cart>> {
    Ok(Json(CartService::new(state.db.clone()).update(patient.id, id, &req)?))
}

#[utoipa::path(
    delete,
    path = "/api/patient/cart/items/{id}",
    params(("id" = i64, Path, description = "Cart line id")),
    responses(
        (status = 200, description = "Cart after removal", body = Cart),
        (status = 403, description = "Another patient's line", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<Cart>> {
    Ok(Json(CartService::new(state.db.clone()).remove(patient.id, id)?))
}

#[utoipa::path(
    delete,
    path = "/api/patient/cart",
    responses(
        (status = 200, description = "Cart emptied", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn clear(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
) -> ApiResult<Json<MessageRes>> {
    let removed = CartService::new(state.db.clone()).clear(patient.id)?;
    Ok(Json(MessageRes::new(format!("Removed {removed} item(s) from the cart."))))
}
