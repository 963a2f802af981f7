/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers should return `Result<T, ApiError>` which automatically
/// converts to appropriate HTTP status codes.
///
/// # Example
///
/// ```
/// use userbase_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(id: Option<u32>) -> ApiResult<Json<serde_json::Value>> {
///     let id = id.ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
///     Ok(Json(json!({ "id": id })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use userbase_shared::{
    auth::{jwt::JwtError, middleware::AuthError, password::PasswordError},
    entity::HookError,
    repository::RepositoryError,
};

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => {
                // the first failing rule is the headline message
                let message = errors
                    .first()
                    .map(|detail| detail.message.clone())
                    .unwrap_or_else(|| "Request validation failed".to_string());
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "validation_error",
                    message,
                    Some(errors),
                )
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                unique_violation(db_err.constraint())
            }
            sqlx::Error::Database(db_err) => {
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Conflict for a unique violation; constraint names stay in the log
fn unique_violation(constraint: Option<&str>) -> ApiError {
    match constraint {
        Some(constraint) if constraint.contains("email") => {
            ApiError::Conflict("Email already exists".to_string())
        }
        other => {
            tracing::debug!(constraint = ?other, "Unique constraint violated");
            ApiError::Conflict("Resource already exists".to_string())
        }
    }
}

/// Convert repository errors to API errors
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(db_err) => db_err.into(),
            RepositoryError::ColumnNotAllowed { .. } | RepositoryError::InvalidArgument(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RepositoryError::Hook(HookError::Password(password_err)) => password_err.into(),
            RepositoryError::Hook(HookError::Invariant(msg)) => ApiError::InternalError(msg),
            RepositoryError::SoftDeleteUnsupported { .. } | RepositoryError::TransactionClosed => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::InvalidFormat(_) => ApiError::Unauthorized("Expected Bearer token".to_string()),
            AuthError::InvalidToken(jwt_err) => jwt_err.into(),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Failed to create token: {}", msg))
            }
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        }
    }
}

/// Convert validator errors to API errors
///
/// Details are ordered by field name so the headline message is stable.
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<(String, Vec<validator::ValidationError>)> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| (field.to_string(), errors.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        let details = fields
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.into_iter().map(move |error| ValidationErrorDetail {
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                    field: field.clone(),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}
