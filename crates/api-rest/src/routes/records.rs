//! Medical records, uploaded as multipart forms with an optional attachment.

use super::blocking;
use crate::error::ApiResult;
use crate::extract::{AnyPrincipal, DoctorAuth, Json, Path, PatientAuth, Query};
use crate::state::AppState;
use api_shared::{MedicalRecord, MessageRes, RecordQuery, ValidationErrorRes};
use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use clinic_core::repositories::medical_records::{
    MedicalRecordForm, MedicalRecordService, Upload,
};
use utoipa::ToSchema;

/// Multipart fields accepted when creating or updating a record.
#[derive(ToSchema)]
pub struct RecordUpload {
    /// Patient id; must be a registered patient.
    pub patient_id: String,
    pub title: String,
    /// `diagnosis`, `lab_result`, `imaging`, `prescription` or `other`.
    pub record_type: String,
    pub description: Option<String>,
    pub record_date: String,
    /// PDF, DOC, DOCX, JPG, JPEG or PNG.
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
}

fn service(state: &AppState) -> MedicalRecordService {
    MedicalRecordService::new(state.db.clone(), state.files.clone())
}

/// Collect the multipart body into a form. Unknown fields are ignored and an empty file
/// part (a browser's "no file chosen") counts as no upload.
async fn read_form(mut multipart: Multipart) -> ApiResult<MedicalRecordForm> {
    let mut form = MedicalRecordForm::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let bytes = field.bytes().await?;
            if !file_name.is_empty() || !bytes.is_empty() {
                form.file = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }
        let value = field.text().await?;
        match name.as_str() {
            "patient_id" => form.patient_id = Some(value),
            "title" => form.title = Some(value),
            "record_type" => form.record_type = Some(value),
            "description" => form.description = Some(value),
            "record_date" => form.record_date = Some(value),
            _ => {}
        }
    }
    Ok(form)
}

/// `filename` parameter safe to place inside a quoted header value.
fn disposition_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && *c != '"' && *c != '\\')
        .collect();
    if cleaned.trim().is_empty() {
        "attachment".into()
    } else {
        cleaned
    }
}

#[utoipa::path(
    get,
    path = "/api/doctor/records",
    params(RecordQuery),
    responses(
        (status = 200, description = "Records written by the caller", body = Vec<MedicalRecord>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_doctor(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Query(query): Query<RecordQuery>,
) -> ApiResult<Json<Vec<MedicalRecord>>> {
    Ok(Json(service(&state).list_for_doctor(doctor.id, query.patient_id)?))
}

#[utoipa::path(
    post,
    path = "/api/doctor/records",
    request_body(content = RecordUpload, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Record created", body = MedicalRecord),
        (status = 413, description = "Upload too large", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Create a record, storing the optional attachment by content hash.
pub async fn create(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<MedicalRecord>)> {
    let form = read_form(multipart).await?;
    let records = service(&state);
    let record = blocking(move || records.create(doctor.id, &form)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    put,
    path = "/api/doctor/records/{id}",
    params(("id" = i64, Path, description = "Record id")),
    request_body(content = RecordUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Record updated", body = MedicalRecord),
        (status = 403, description = "Another doctor's record", body = MessageRes),
        (status = 422, description = "Validation failed", body = ValidationErrorRes)
    ),
    security(("bearer_auth" = []))
)]
/// Replace a record's fields. Sending a file replaces the attachment.
pub async fn update(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<Json<MedicalRecord>> {
    let form = read_form(multipart).await?;
    let records = service(&state);
    Ok(Json(blocking(move || records.update(doctor.id, id, &form)).await?))
}

#[utoipa::path(
    delete,
    path = "/api/doctor/records/{id}",
    params(("id" = i64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record deleted", body = MessageRes),
        (status = 403, description = "Another doctor's record", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete(
    State(state): State<AppState>,
    DoctorAuth(doctor): DoctorAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageRes>> {
    service(&state).delete(doctor.id, id)?;
    Ok(Json(MessageRes::new("Medical record deleted successfully.")))
}

#[utoipa::path(
    get,
    path = "/api/patient/records",
    responses(
        (status = 200, description = "The caller's records", body = Vec<MedicalRecord>),
        (status = 401, description = "Unauthenticated", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_for_patient(
    State(state): State<AppState>,
    PatientAuth(patient): PatientAuth,
) -> ApiResult<Json<Vec<MedicalRecord>>> {
    Ok(Json(service(&state).list_for_patient(patient.id)?))
}

#[utoipa::path(
    get,
    path = "/api/records/{id}",
    params(("id" = i64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Record", body = MedicalRecord),
        (status = 403, description = "Not the caller's record", body = MessageRes),
        (status = 404, description = "Unknown record", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
pub async fn show(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path(id): Path<i64>,
) -> ApiResult<Json<MedicalRecord>> {
    Ok(Json(service(&state).get(principal.actor(), id)?))
}

#[utoipa::path(
    get,
    path = "/api/records/{id}/download",
    params(("id" = i64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Attachment bytes with the stored content type"),
        (status = 403, description = "Not the caller's record", body = MessageRes),
        (status = 404, description = "Unknown record or no attachment", body = MessageRes)
    ),
    security(("bearer_auth" = []))
)]
/// Download a record's attachment with its stored content type.
pub async fn download(
    State(state): State<AppState>,
    principal: AnyPrincipal,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let records = service(&state);
    let actor = principal.actor();
    let file = blocking(move || records.download(actor, id)).await?;
    let media_type = if file.media_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        file.media_type
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        disposition_file_name(&file.file_name)
    );
    Ok((
        [(CONTENT_TYPE, media_type), (CONTENT_DISPOSITION, disposition)],
        file.bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_names_are_header_safe() {
        assert_eq!(disposition_file_name("scan.png"), "scan.png");
        assert_eq!(disposition_file_name("my \"best\" x-ray.jpg"), "my best x-ray.jpg");
        assert_eq!(disposition_file_name("résumé.pdf"), "rsum.pdf");
        assert_eq!(disposition_file_name("\"\""), "attachment");
    }
}
