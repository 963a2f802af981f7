/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/login` - Exchange email and password for a token
/// - `POST /api/auth/register` - Create an account and get a token
/// - `GET  /api/auth/me` - Profile of the bearer (requires JWT)

use crate::{
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::users::CreateUserRequest,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use userbase_shared::{
    auth::{jwt::TokenIssuer, middleware::AuthContext, password},
    entity::User,
    service::Service,
};
use uuid::Uuid;
use validator::Validate;

/// Message for every failed login, whichever check failed
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Register request; same rules as creating a user
pub type RegisterRequest = CreateUserRequest;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,

    /// Password
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login and register response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Signed bearer token
    pub token: String,

    /// Authenticated user
    pub user: User,
}

/// Profile of the authenticated user
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Hash verified against when the email is unknown
///
/// Keeps the unknown-email branch as slow as the wrong-password branch.
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();

    DUMMY_HASH.get_or_init(|| {
        password::hash_password("userbase-timing-equalizer").unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to prepare dummy password hash");
            String::new()
        })
    })
}

/// Login
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/login
/// Content-Type: application/json
///
/// { "email": "ada@example.com", "password": "secret1" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body
/// - `401 Unauthorized`: Unknown email or wrong password (same body for both)
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(users): State<Service<User>>,
    State(tokens): State<Arc<TokenIssuer>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = users.find_by_email(&req.email).await?;

    let verified = match &user {
        Some(user) => user.verify_password(&req.password)?,
        None => {
            // result ignored; only the work matters
            let _ = password::verify_password(&req.password, dummy_hash());
            false
        }
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            tracing::warn!(email = %req.email, "Failed login attempt");
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
    };

    let token = tokens.issue(user.id)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse { token, user }))
}

/// Register a new user
///
/// The token is issued after the insert, so its subject is the stored id.
///
/// # Endpoint
///
/// ```text
/// POST /api/auth/register
/// Content-Type: application/json
///
/// {
///   "first_name": "Ada",
///   "last_name": "Lovelace",
///   "email": "ada@example.com",
///   "password": "secret1"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Malformed body
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(users): State<Service<User>>,
    State(tokens): State<Arc<TokenIssuer>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let user = users
        .create(User::new(req.first_name, req.last_name, req.email, req.password))
        .await?;

    let token = tokens.issue(user.id)?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Current user
///
/// # Errors
///
/// - `401 Unauthorized`: Missing or invalid token
/// - `404 Not Found`: The token's user no longer exists
pub async fn me(
    State(users): State<Service<User>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let user = users
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
    }))
}
