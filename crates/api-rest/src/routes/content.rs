//! Blog posts and gallery items published by doctors.

use crate::error::ApiResult;
use crate::extract::{DoctorAuth, Json, OptionalPrincipal, Path, Query};
use crate::state::AppState;
use api_shared::{
    Blog, BlogReq, Gallery, GalleryQuery, GalleryReq, MessageRes, SearchQuery, ValidationErrorRes,
};
use axum::extract::State;
use axum::http::StatusCode;
use clinic_core::auth::Principal;
use clinic_core::repositories::blogs::BlogService;
use clinic_core::repositories::galleries::GalleryService;

#[utoipa::path(
    get,
    path = "/api/blogs",
    params(SearchQuery),
    responses(
        (status = 200, description = "Published posts, newest first", body = Vec<Blog>)
    )
)]
pub async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Blog>>> {
    let service = BlogService::new(state.db.clone());
    Ok(Json(service.list_published(query.search.as_deref())?))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Post", body = Blog),
        (status = 404, description = "Unknown slug or unpublished draft", body = MessageRes)
    ),
    security((), ("bearer_auth" = []))
)]
/// Show a post. Drafts are visible only to their author.
pub async fn show_blog(
    State(state): State<AppState>,
    OptionalPrincipal(principal): OptionalPrincipal,
    Path(slug): Path<String>,
) -> ApiResult<Json<Blog>> {
    let viewer = match principal {
        Some(Principal::Doctor(doctor)) => Some(doctor.id),
        _ => None,
    };
    Ok(Json(BlogService::new(state.db.clone()).get_by_slug(&slug, viewer)?))
}

#[utoipa::path(
    get,
    path = "/api/doctor/blogs",
    responses(
        (status = 200, description = "The caller's posts, drafts included", body = Vec<Blog>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_blogs(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
) -> ApiResult<Json<Vec<Blog>>> {
    Ok(Json(BlogService::new(state.db.clone()).list_for_author(doctor.id)?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/blogs",
    request_body = BlogReq,
    responses(
        (status = 201, description = "Post created", body = Blog),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_blog(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<BlogReq>,
) -> ApiResult<(StatusCode, Json<Blog>)> {
    let blog = BlogService::new(state.db.clone()).create(doctor.id, &req)?;
    Ok((StatusCode::CREATED, Json(blog)))
}

#[utoipa::path(
    put,
    path = "/api/doctor/blogs/{id}",
    params(("id" = i64, Path, description = "Post id")),
    request_body = BlogReq,
    responses(
        (status = 200, description = "Post updated", body = Blog),
        (status = 403, description = "Another doctor's post", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_blog(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
    Json(req): Json<BlogReq>,
) -> ApiResult<Json<Blog>> {
    Ok(Json(BlogService::new(state.db.clone()).update(doctor.id, id, &req)?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/blogs/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post deleted", body = MessageRes),
        (status = 403, description = "Another doctor's post", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_blog(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    BlogService::new(state.db.clone()).delete(doctor.id, id)?;
    Ok(Json(MessageRes::new("Blog deleted successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/galleries",
    params(GalleryQuery),
    responses(
        (status = 200, description = "Gallery items, newest first", body = Vec<Gallery>)
    )
)]
pub async fn list_galleries(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<Json<Vec<Gallery>>> {
    Ok(Json(GalleryService::new(state.db.clone()).list(query.doctor_id)?))
}

#[utoipa::path(
    get,
    path = "/api/galleries/{id}",
    params(("id" = i64, Path, description = "Gallery item id")),
    responses(
        (status = 200, description = "Gallery item", body = Gallery),
        (status = 404, description = "Unknown item", body = MessageRes)
    )
)]
pub async fn show_gallery(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Gallery>> {
    Ok(Json(GalleryService::new(state.db.clone()).get(id)?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/galleries",
    request_body = GalleryReq,
    responses(
        (status = 201, description = "Gallery item created", body = Gallery),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_gallery(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Json(req): Json<GalleryReq>,
) -> ApiResult<(StatusCode, Json<Gallery>)> {
    let gallery = GalleryService::new(state.db.clone()).create(doctor.id, &req)?;
    Ok((StatusCode::CREATED, Json(gallery)))
}

#[utoipa::path(
    put,
    path = "/api/doctor/galleries/{id}",
    params(("id" = i64, Path, description = "Gallery item id")),
    request_body = GalleryReq,
    responses(
        (status = 200, description = "Gallery item updated", body = Gallery),
        (status = 403, description = "Another doctor's item", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_gallery(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
    Json(req): Json<GalleryReq>,
) -> ApiResult<Json<Gallery>> {
    Ok(Json(GalleryService::new(state.db.clone()).update(doctor.id, id, &req)?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/galleries/{id}",
    params(("id" = i64, Path, description = "Gallery item id")),
    responses(
        (status = 200, description = "Gallery item deleted", body = MessageRes),
        (status = 403, description = "Another doctor's item", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_gallery(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    GalleryService::new(state.db.clone()).delete(doctor.id, id)?;
    Ok(Json(MessageRes::new("Gallery item deleted successfully.")))
}
