/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; every error renders as
/// `{"error": "<message>"}` with the matching status code.
///
/// # Example
///
/// ```
/// use roster_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(name: Option<String>) -> ApiResult<Json<Value>> {
///     let name = name.ok_or_else(|| ApiError::BadRequest("Full name is required".to_string()))?;
///     Ok(Json(json!({ "name": name })))
/// }
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roster_shared::error::RecordError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Conflict (409), a concurrent writer won
    #[error("{0}")]
    Conflict(String),

    /// Internal server error (500); the message is logged, never returned
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self {
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => {
                tracing::debug!(status = status.as_u16(), error = %msg, "Request rejected");
                msg
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Convert record errors to API errors
impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::UserNotFound { .. } => ApiError::NotFound(err.to_string()),
            RecordError::Conflict(_) => ApiError::Conflict(err.to_string()),
            RecordError::Database(db_err) => ApiError::from(db_err),
            RecordError::InvalidName
            | RecordError::InvalidMobile
            | RecordError::InvalidTaxId
            | RecordError::ManagerNotActive
            | RecordError::MissingKey(_)
            | RecordError::EmptyChangeSet
            | RecordError::UnsupportedBulkUpdate
            | RecordError::UnknownField(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::InternalError(format!("Database error: {}", err))
    }
}

/// Malformed or non-JSON request bodies
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "Rejected request body");
        ApiError::BadRequest("Invalid request body".to_string())
    }
}
