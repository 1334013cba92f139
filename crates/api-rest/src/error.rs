//! HTTP mapping for core errors.
//!
//! Every handler returns `Result<_, ApiError>`. Validation failures become 422 with the
//! field map; unexpected failures are logged and reported with a generic message.
//! Extractor rejections (bad JSON, path or query values) are rendered the same way.

use api_shared::{MessageRes, ValidationErrorRes};
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_core::constants::BOOKING_FAILED_MESSAGE;
use clinic_core::ClinicError;

pub const VALIDATION_MESSAGE: &str = "The given data was invalid.";
pub const SERVER_ERROR_MESSAGE: &str = "Server Error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] ClinicError),
    #[error("request rejected: {message}")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Field error for a value that did not deserialize.
///
/// The rejection text reads `<context>: <path>: <reason>`; the path becomes the field
/// name, falling back to `fallback` when the failure is not tied to one field.
fn invalid_value(text: &str, fallback: &str) -> ClinicError {
    let field = text
        .split_once(": ")
        .and_then(|(_, rest)| rest.split_once(": "))
        .map(|(path, _)| path)
        .filter(|path| !path.is_empty() && *path != "." && !path.contains(char::is_whitespace))
        .unwrap_or(fallback);
    ClinicError::field(
        field,
        format!("The {} field has an invalid value.", field.replace('_', " ")),
    )
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                ApiError::Core(invalid_value(&err.body_text(), "body"))
            }
            other => ApiError::Rejected {
                status: other.status(),
                message: other.body_text(),
            },
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Core(invalid_value(&rejection.body_text(), "query"))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            // `/api/doctors/abc` names no resource.
            PathRejection::FailedToDeserializePathParams(_) => {
                ApiError::Core(ClinicError::NotFound("resource"))
            }
            other => ApiError::Rejected {
                status: other.status(),
                message: other.body_text(),
            },
        }
    }
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(MessageRes::new(text))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Rejected { status, message: text } => return message(status, text),
            // Oversized uploads surface here as 413.
            ApiError::Multipart(err) => return message(err.status(), err.body_text()),
            ApiError::Task(err) => {
                tracing::error!(error = %err, "blocking task failed");
                return message(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE);
            }
            ApiError::Core(err) => err,
        };
        match err {
            ClinicError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorRes {
                    message: VALIDATION_MESSAGE.into(),
                    errors: errors.as_map().clone(),
                }),
            )
                .into_response(),
            ClinicError::InvalidInput(detail) => message(StatusCode::UNPROCESSABLE_ENTITY, detail),
            ClinicError::NotFound(entity) => {
                message(StatusCode::NOT_FOUND, format!("No {entity} found."))
            }
            ClinicError::Unauthenticated => message(StatusCode::UNAUTHORIZED, "Unauthenticated."),
            ClinicError::InvalidCredentials => message(
                StatusCode::UNAUTHORIZED,
                "These credentials do not match our records.",
            ),
            ClinicError::AccountInactive => {
                message(StatusCode::FORBIDDEN, "Your account is inactive.")
            }
            ClinicError::Forbidden => message(
                StatusCode::FORBIDDEN,
                "This action is unauthorized.",
            ),
            ClinicError::BookingFailed(source) => {
                tracing::error!(error = %source, "booking transaction failed");
                message(StatusCode::INTERNAL_SERVER_ERROR, BOOKING_FAILED_MESSAGE)
            }
            other => {
                tracing::error!(error = %other, "request failed");
                message(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_maps_to_422_with_field_errors() {
        let response = ApiError::from(ClinicError::field("email", "The email field is required."))
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["message"], VALIDATION_MESSAGE);
        assert_eq!(json["errors"]["email"][0], "The email field is required.");
    }

    #[tokio::test]
    async fn ownership_and_missing_map_to_403_and_404() {
        let forbidden = ApiError::from(ClinicError::Forbidden).into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        let missing = ApiError::from(ClinicError::NotFound("prescription")).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(missing).await["message"], "No prescription found.");
    }

    #[tokio::test]
    async fn booking_failure_hides_details() {
        let source = clinic_core::db::SqlError::QueryReturnedNoRows;
        let response = ApiError::from(ClinicError::BookingFailed(source)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], BOOKING_FAILED_MESSAGE);
    }

    #[test]
    fn deserialize_failures_name_the_field() {
        let err = invalid_value(
            "Failed to deserialize the JSON body into the target type: doctor_id: invalid type: \
             string \"5\", expected i64 at line 1 column 16",
            "body",
        );
        let ClinicError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("doctor_id").unwrap()[0],
            "The doctor id field has an invalid value."
        );

        let err = invalid_value(
            "Failed to deserialize the JSON body into the target type: invalid type: map",
            "body",
        );
        assert!(matches!(err, ClinicError::Validation(e) if e.has("body")));
    }

    #[tokio::test]
    async fn internal_errors_are_generic() {
        let response = ApiError::from(ClinicError::LockPoisoned).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], SERVER_ERROR_MESSAGE);
    }
}
