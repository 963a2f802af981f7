/// Bearer-token authentication for Axum
///
/// [`authenticate`] walks one request from unauthenticated to authenticated:
/// the `Authorization` header must be present, must carry a `Bearer` token,
/// and the token must pass [`TokenIssuer::validate`]. Any failure stops the
/// walk with an [`AuthError`], which always renders as 401.
///
/// On success the caller inserts the returned [`AuthContext`] into the
/// request extensions, where handlers pick it up with `Extension<AuthContext>`.
///
/// # Example
///
/// ```no_run
/// use axum::{extract::Request, middleware::Next, response::Response};
/// use std::sync::Arc;
/// use userbase_shared::auth::{jwt::TokenIssuer, middleware::{authenticate, AuthError}};
///
/// async fn require_jwt(
///     issuer: Arc<TokenIssuer>,
///     mut req: Request,
///     next: Next,
/// ) -> Result<Response, AuthError> {
///     let auth = authenticate(req.headers(), &issuer)?;
///     req.extensions_mut().insert(auth);
///     Ok(next.run(req).await)
/// }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{JwtError, TokenIssuer};

/// Authenticated identity bound to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Subject of the validated token
    pub user_id: Uuid,
}

/// Error type for authentication middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    #[error("Invalid authorization header: {0}")]
    InvalidFormat(String),

    /// Token validation failed
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::MissingCredentials => "Missing authorization header".to_string(),
            AuthError::InvalidFormat(_) => "Expected Bearer token".to_string(),
            AuthError::InvalidToken(JwtError::Expired) => "Token expired".to_string(),
            AuthError::InvalidToken(_) => "Invalid or expired token".to_string(),
        };

        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "message": message })),
        )
            .into_response()
    }
}

/// Extracts and validates the bearer token carried by `headers`
///
/// # Errors
///
/// - `AuthError::MissingCredentials` when there is no readable `Authorization` header
/// - `AuthError::InvalidFormat` when the header is not `Bearer <token>`
/// - `AuthError::InvalidToken` when the token fails validation
pub fn authenticate(headers: &HeaderMap, issuer: &TokenIssuer) -> Result<AuthContext, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = issuer.validate(token)?;

    Ok(AuthContext {
        user_id: claims.sub,
    })
}
