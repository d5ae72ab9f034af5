use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::AuthConfig;

/// Accepts `x-api-key: <key>` or `authorization: Bearer <key>`. Open
/// when no keys are configured.
pub fn check_api_key(headers: &HeaderMap, auth: Option<&AuthConfig>) -> Result<(), Box<Response>> {
    let Some(auth) = auth else {
        return Ok(());
    };
    if auth.api_keys.is_empty() {
        return Ok(());
    }

    let key = match (headers.get("x-api-key"), headers.get("authorization")) {
        (Some(value), _) => value.to_str().ok(),
        (None, Some(value)) => value
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer ")),
        (None, None) => return Err(unauthorized("missing api key")),
    };
    match key {
        Some(key) if auth.api_keys.iter().any(|allowed| allowed == key.trim()) => Ok(()),
        _ => Err(unauthorized("invalid api key")),
    }
}

fn unauthorized(message: &'static str) -> Box<Response> {
    Box::new((StatusCode::UNAUTHORIZED, message).into_response())
}
