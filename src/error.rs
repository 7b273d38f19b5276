//! # Error Handling
//!
//! Unified error handling for the NFC cards API. Every failure leaves the
//! service as a JSON envelope of the form
//! `{ "success": false, "statusCode": 404, "error": "...", "message": "..." }`
//! with the request trace id attached.

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::media::MediaError;
use crate::telemetry;

/// Label used for every 5xx response body.
pub const SERVER_ERROR: &str = "Server error";

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Always `false` for errors
    pub success: bool,
    /// Numeric HTTP status, mirrored into the body
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Human-readable error summary
    pub error: Box<str>,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Underlying cause, when one is worth showing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<str>>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code, code and summary
    pub fn new<C: Into<String>, E: Into<String>>(status: StatusCode, code: C, error: E) -> Self {
        Self {
            status,
            success: false,
            status_code: status.as_u16(),
            error: error.into().into_boxed_str(),
            code: code.into().into_boxed_str(),
            message: None,
            details: None,
            trace_id: telemetry::current_trace_id().map(String::into_boxed_str),
        }
    }

    /// Attach the underlying message
    pub fn with_message<M: Into<String>>(mut self, message: M) -> Self {
        self.message = Some(message.into().into_boxed_str());
        self
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// 500 with the generic summary and the cause in `message`
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            SERVER_ERROR,
        )
        .with_message(message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        if let Some(trace_id) = self.trace_id.as_deref()
            && let Ok(value) = HeaderValue::from_str(trace_id)
        {
            headers.insert(telemetry::REQUEST_ID_HEADER, value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

/// Business-rule failures raised by repositories and services.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("{0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("{0}")]
    Internal(String),
}

impl RepositoryError {
    pub fn database_error(error: sea_orm::DbErr) -> Self {
        Self::Database(error)
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation_error<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict<M: Into<String>>(message: M) -> Self {
        Self::Conflict(message.into())
    }
}

pub(crate) fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    db_error
        .code()
        .is_some_and(|code| code == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code.as_ref()))
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(message) => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            RepositoryError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
            }
            RepositoryError::Conflict(message) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", message)
            }
            RepositoryError::Unauthorized(message) => {
                ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
            }
            RepositoryError::Forbidden(message) => {
                ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
            }
            RepositoryError::Media(error) => error.into(),
            RepositoryError::Database(error) => error.into(),
            RepositoryError::Internal(message) => {
                tracing::error!(%message, "Internal error");
                ApiError::internal(message)
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::NotConfigured => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Media uploads are not configured",
            ),
            other => {
                tracing::error!(error = %other, "Media upload failed");
                ApiError::new(StatusCode::BAD_GATEWAY, "MEDIA_UPLOAD_FAILED", SERVER_ERROR)
                    .with_message(other.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);
        ApiError::internal(error.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => {
                format!("JSON syntax error: {}", err.body_text())
            }
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            format!("Invalid query string: {}", rejection.body_text()),
        )
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "VALIDATION_FAILED",
            format!("Invalid multipart body: {}", error.body_text()),
        )
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        if is_unique_violation(&error) {
            tracing::debug!(?error, "Unique constraint violation detected");
            return ApiError::new(StatusCode::CONFLICT, "CONFLICT", "Resource already exists");
        }

        match error {
            sea_orm::DbErr::RecordNotFound(record) => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                ApiError::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                ApiError::internal(other.to_string())
            }
        }
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create a forbidden error (403)
pub fn forbidden(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Insufficient permissions");
    ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "Bad input");

        assert!(!error.success);
        assert_eq!(error.status_code, 400);
        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.error, Box::from("Bad input"));
        assert!(error.message.is_none());
        assert!(error.details.is_none());
    }

    #[test]
    fn test_api_error_with_details() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", "Test error message")
            .with_details(json!({"field": "value"}));

        assert_eq!(error.details, Some(Box::new(json!({"field": "value"}))));
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let response = ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Company with ID 7 not found",
        )
        .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["statusCode"], 404);
        assert_eq!(body["error"], "Company with ID 7 not found");
        assert!(body.get("message").is_none());
        assert!(body.get("status").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_keeps_cause() {
        let api_error: ApiError = RepositoryError::Internal("disk on fire".into()).into();
        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(api_error.into_response()).await;
        assert_eq!(body["error"], SERVER_ERROR);
        assert_eq!(body["message"], "disk on fire");
    }

    #[test]
    fn test_repository_error_mapping() {
        let cases = [
            (RepositoryError::not_found("gone"), StatusCode::NOT_FOUND),
            (RepositoryError::validation_error("bad"), StatusCode::BAD_REQUEST),
            (RepositoryError::conflict("dupe"), StatusCode::CONFLICT),
            (
                RepositoryError::Unauthorized("who".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (RepositoryError::Forbidden("no".into()), StatusCode::FORBIDDEN),
        ];

        for (error, expected) in cases {
            let message = error.to_string();
            let api_error: ApiError = error.into();
            assert_eq!(api_error.status, expected);
            assert_eq!(api_error.error.as_ref(), message);
        }
    }

    #[test]
    fn test_media_error_mapping() {
        let api_error: ApiError = MediaError::NotConfigured.into();
        assert_eq!(api_error.status, StatusCode::SERVICE_UNAVAILABLE);

        let api_error: ApiError = MediaError::MissingSecureUrl.into();
        assert_eq!(api_error.status, StatusCode::BAD_GATEWAY);
        assert_eq!(api_error.error, Box::from(SERVER_ERROR));
    }

    #[test]
    fn test_database_error_mapping() {
        let api_error: ApiError =
            sea_orm::DbErr::RecordNotFound("companies#3".to_string()).into();
        assert_eq!(api_error.status, StatusCode::NOT_FOUND);

        let api_error: ApiError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_error.error, Box::from(SERVER_ERROR));
        assert!(api_error.message.unwrap().contains("boom"));
    }

    #[test]
    fn test_from_anyhow() {
        let api_error: ApiError = anyhow::anyhow!("Something went wrong").into();

        assert_eq!(api_error.code, Box::from("INTERNAL_SERVER_ERROR"));
        assert_eq!(api_error.message.as_deref(), Some("Something went wrong"));
    }

    #[test]
    fn test_auth_error_helpers() {
        let error = unauthorized(None);
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.error, Box::from("Authentication required"));

        let error = forbidden(Some("Insufficient role"));
        assert_eq!(error.status, StatusCode::FORBIDDEN);
        assert_eq!(error.error, Box::from("Insufficient role"));
    }
}
