/// Request extractors that answer with [`ApiError`] bodies
///
/// Axum's stock `Json` and `Query` rejections are plain text with a mix of
/// 400/415/422 statuses. These wrappers turn every decoding failure into a
/// JSON 400 and run `validator` rules on decoded bodies, so validation
/// failures are always 422 with the first failing rule as the message.

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// JSON body that has passed its `validator` rules
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        value.validate()?;

        Ok(Self(value))
    }
}

/// Query string whose decoding errors are JSON 400s
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        Ok(Self(value))
    }
}

/// Parses a path identifier, answering 400 when it is malformed
pub fn parse_id<I: std::str::FromStr>(raw: &str) -> Result<I, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", raw)))
}
