/// Request activity recording
///
/// Every request that reaches the router produces exactly one `activities`
/// row, written after the final status is known. The insert runs on a
/// spawned task so a slow or failing database never delays or alters the
/// response.
///
/// # Recorded Fields
///
/// - method and path
/// - client IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address
/// - `User-Agent`
/// - request body, with JSON `password` fields replaced by `[REDACTED]`
/// - final status code
/// - the authenticated user, when the JWT layer ran for this request

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::net::SocketAddr;
use userbase_shared::{auth::middleware::AuthContext, entity::Activity, service::Service};

use crate::error::ApiError;

/// Largest request body that is buffered and recorded
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Replacement for redacted JSON values
const REDACTED: &str = "[REDACTED]";

/// Activity recording middleware
///
/// Buffers the request body so it can be both recorded and handed on. A body
/// over [`MAX_BODY_BYTES`] or one that cannot be read is answered with 400
/// without reaching the handler, and that response is recorded like any other.
pub async fn record_activity(
    State(activities): State<Service<Activity>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let (parts, body) = request.into_parts();
    let (response, recorded_body) = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => {
            let recorded = redact_body(&bytes);
            let request = Request::from_parts(parts, Body::from(bytes));
            (next.run(request).await, recorded)
        }
        Err(err) => {
            tracing::warn!(error = %err, %method, %path, "Failed to buffer request body");
            let response = ApiError::BadRequest(
                "Request body is too large or could not be read".to_string(),
            )
            .into_response();
            (response, String::new())
        }
    };

    let user_id = response
        .extensions()
        .get::<AuthContext>()
        .map(|auth| auth.user_id);
    let status = response.status().as_u16();

    let activity = Activity::request(user_id, path, method, ip, user_agent, recorded_body, status);

    tokio::spawn(async move {
        if let Err(e) = activities.log(activity).await {
            tracing::error!(error = %e, "Failed to record activity");
        }
    });

    response
}

/// Best-effort client address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header_value("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|hop| !hop.is_empty()) {
            return first.to_string();
        }
    }

    if let Some(real_ip) = header_value("x-real-ip") {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

/// Body text as stored in the activity row
///
/// JSON bodies are re-serialized with every `password` key redacted; other
/// bodies are stored as lossy UTF-8 with NUL bytes replaced, since a
/// PostgreSQL `TEXT` value cannot hold them.
pub fn redact_body(body: &Bytes) -> String {
    if body.is_empty() {
        return String::new();
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(mut value) => {
            redact_value(&mut value);
            value.to_string()
        }
        Err(_) => String::from_utf8_lossy(body).replace('\0', "\u{FFFD}"),
    }
}

fn redact_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if key.eq_ignore_ascii_case("password") {
                    *field = serde_json::Value::String(REDACTED.to_string());
                } else {
                    redact_value(field);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}
