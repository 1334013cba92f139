//! Medicine and laboratory test catalogue.

use crate::error::ApiResult;
use crate::extract::{DoctorAuth, Json, Path, Query};
use crate::state::AppState;
use api_shared::{
    LabTest, LabTestReq, Medicine, MedicineReq, MessageRes, SearchQuery, ValidationErrorRes,
};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::repositories::catalogue::CatalogueService;

fn service(state: &AppState) -> CatalogueService {
    CatalogueService::new(state.db.clone())
}

#[utoipa::path(
    get,
    path = "/api/medicines",
    params(SearchQuery),
    responses(
        (status = 200, description = "Medicines matching the search", body = Vec<Medicine>)
    )
)]
pub async fn list_medicines(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Medicine>>> {
    Ok(Json(service(&state).list_medicines(query.search.as_deref())?))
}

#[utoipa::path(
    get,
    path = "/api/medicines/{id}",
    params(("id" = i64, Path, description = "Medicine id")),
    responses(
        (status = 200, description = "Medicine", body = Medicine),
        (status = 404, description = "Unknown medicine", body = MessageRes)
    )
)]
pub async fn show_medicine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Medicine>> {
    Ok(Json(service(&state).get_medicine(id)?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/medicines",
    request_body = MedicineReq,
    responses(
        (status = 201, description = "Medicine created", body = Medicine),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_medicine(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
    Json(req): Json<MedicineReq>,
) -> ApiResult<(StatusCode, Json<Medicine>)> {
    Ok((StatusCode::CREATED, Json(service(&state).create_medicine(&req)?)))
}

#[utoipa::path(
    put,
    path = "/api/doctor/medicines/{id}",
    params(("id" = i64, Path, description = "Medicine id")),
    request_body = MedicineReq,
    responses(
        (status = 200, description = "Medicine updated", body = Medicine),
        (status = 404, description = "Unknown medicine", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_medicine(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
    Path(id): Path<i64>,
    Json(req): Json<MedicineReq>,
) -> ApiResult<Json<Medicine>> {
    Ok(Json(service(&state).update_medicine(id, &req)?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/medicines/{id}",
    params(("id" = i64, Path, description = "Medicine id")),
    responses(
        (status = 200, description = "Medicine deleted", body = MessageRes),
        (status = 404, description = "Unknown medicine", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_medicine(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    service(&state).delete_medicine(id)?;
    Ok(Json(MessageRes::new("Medicine deleted successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/tests",
    params(SearchQuery),
    responses(
        (status = 200, description = "Laboratory tests matching the search", body = Vec<LabTest>)
    )
)]
pub async fn list_tests(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<LabTest>>> {
    Ok(Json(service(&state).list_tests(query.search.as_deref())?))
}

#[utoipa::path(
    get,
    path = "/api/tests/{id}",
    params(("id" = i64, Path, description = "Test id")),
    responses(
        (status = 200, description = "Laboratory test", body = LabTest),
        (status = 404, description = "Unknown test", body = MessageRes)
    )
)]
pub async fn show_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<LabTest>> {
    Ok(Json(service(&state).get_test(id)?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/tests",
    request_body = LabTestReq,
    responses(
        (status = 201, description = "Test created", body = LabTest),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_test(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
    Json(req): Json<LabTestReq>,
) -> ApiResult<(StatusCode, Json<LabTest>)> {
    Ok((StatusCode::CREATED, Json(service(&state).create_test(&req)?)))
}

#[utoipa::path(
    put,
    path = "/api/doctor/tests/{id}",
    params(("id" = i64, Path, description = "Test id")),
    request_body = LabTestReq,
    responses(
        (status = 200, description = "Test updated", body = LabTest),
        (status = 404, description = "Unknown test", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_test(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
    Path(id): Path<i64>,
    Json(req): Json<LabTestReq>,
) -> ApiResult<Json<LabTest>> {
    Ok(Json(service(&state).update_test(id, &req)?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/tests/{id}",
    params(("id" = i64, Path, description = "Test id")),
    responses(
        (status = 200, description = "Test deleted", body = MessageRes),
        (status = 404, description = "Unknown test", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_test(
    State(state): State<AppState>,
    DoctorAuth(_doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    service(&state).delete_test(id)?;
    Ok(Json(MessageRes::new("Test deleted successfully.")))
}
