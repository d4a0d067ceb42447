use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::{Actor, ActorRole};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Bearer token for the API itself, then the acting user as asserted by the
/// gateway in `X-Actor-Id` / `X-Actor-Role`.
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Actor, AppError> {
    check_auth(headers, &state.config.api_token)?;

    let id = header(headers, "x-actor-id")
        .ok_or_else(|| AppError::BadRequest("missing X-Actor-Id header".into()))?;
    let role: ActorRole = header(headers, "x-actor-role")
        .ok_or_else(|| AppError::BadRequest("missing X-Actor-Role header".into()))?
        .parse()
        .map_err(AppError::BadRequest)?;

    if role == ActorRole::System {
        return Err(AppError::BadRequest(
            "the system role cannot be asserted by callers".into(),
        ));
    }

    Ok(Actor::new(id, role))
}
