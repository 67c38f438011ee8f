use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

use crate::usage::ErrorNote;

/// Structured error response returned by all JSON endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    #[schema(example = false)]
    pub success: bool,
    /// Human-readable error description.
    #[schema(example = "Storage quota exceeded")]
    pub error: String,
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `API_KEY_MISSING`, `API_KEY_INVALID`, `SIGNATURE_INVALID`,
    /// `PERMISSION_DENIED`, `NOT_FOUND`, `CONFLICT`, `RATE_LIMITED`, `QUOTA_EXCEEDED`,
    /// `STORAGE_ERROR`, `INTERNAL_ERROR`.
    #[schema(example = "QUOTA_EXCEEDED")]
    pub error_code: &'static str,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    ApiKeyMissing,
    /// Unknown or deactivated API key.
    ApiKeyInvalid(String),
    /// Signature or timestamp rejected.
    SignatureInvalid(String),
    PermissionDenied(String),
    NotFound(String),
    Conflict(String),
    /// Request rate exceeded. Contains seconds until retry is allowed.
    RateLimited {
        retry_after: u64,
        message: String,
    },
    /// Storage capacity exceeded.
    QuotaExceeded(String),
    /// The object store failed or timed out.
    Storage(StorageError),
    Internal(String),
}

impl AppError {
    fn body(code: &'static str, error: impl Into<String>) -> ErrorBody {
        ErrorBody {
            success: false,
            error: error.into(),
            error_code: code,
        }
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Self::body("VALIDATION_ERROR", msg))
            }
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                Self::body("TOKEN_MISSING", "Authentication required"),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                Self::body("TOKEN_INVALID", "Invalid or expired token"),
            ),
            AppError::ApiKeyMissing => (
                StatusCode::UNAUTHORIZED,
                Self::body(
                    "API_KEY_MISSING",
                    "Provide an X-API-Key header or a bearer token",
                ),
            ),
            AppError::ApiKeyInvalid(msg) => {
                (StatusCode::UNAUTHORIZED, Self::body("API_KEY_INVALID", msg))
            }
            AppError::SignatureInvalid(msg) => {
                (StatusCode::FORBIDDEN, Self::body("SIGNATURE_INVALID", msg))
            }
            AppError::PermissionDenied(msg) => {
                (StatusCode::FORBIDDEN, Self::body("PERMISSION_DENIED", msg))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Self::body("NOT_FOUND", msg)),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, Self::body("CONFLICT", msg)),
            AppError::RateLimited { message, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                Self::body("RATE_LIMITED", message),
            ),
            AppError::QuotaExceeded(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                Self::body("QUOTA_EXCEEDED", msg),
            ),
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Object store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Self::body("STORAGE_ERROR", "File storage is temporarily unavailable"),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Self::body("INTERNAL_ERROR", "An unexpected error occurred"),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = if let AppError::RateLimited { retry_after, .. } = &self {
            Some(*retry_after)
        } else {
            None
        };

        let (status, body) = self.status_and_body();
        let note = ErrorNote(body.error.clone());

        let mut response = if let Some(seconds) = retry_after {
            (status, [("Retry-After", seconds.to_string())], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        };
        response.extensions_mut().insert(note);
        response
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => {
                tracing::warn!(key = %key, "Object missing from backing store");
                AppError::NotFound("File content not found".into())
            }
            StorageError::SizeLimitExceeded { limit, .. } => {
                AppError::Validation(format!("File exceeds maximum size of {limit} bytes"))
            }
            other => AppError::Storage(other),
        }
    }
}
