//! Request plumbing shared by the workflow routers: actor headers, `If-Match` versions, JSON
//! bodies, and the error envelope.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

use super::{Actor, EngineError, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_UNIVERSITY_HEADER: &str = "x-actor-university";

/// Build the acting user from the identity headers set by the gateway.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, EngineError> {
    let id = header_text(headers, ACTOR_ID_HEADER)?
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EngineError::Forbidden(format!("missing {ACTOR_ID_HEADER} header")))?;
    let role = header_text(headers, ACTOR_ROLE_HEADER)?
        .ok_or_else(|| EngineError::Forbidden(format!("missing {ACTOR_ROLE_HEADER} header")))?
        .parse::<Role>()
        .map_err(EngineError::Forbidden)?;
    let actor = Actor::new(id, role);
    Ok(match header_text(headers, ACTOR_UNIVERSITY_HEADER)? {
        Some(university) if !university.is_empty() => actor.with_university(university),
        _ => actor,
    })
}

/// Version the client last saw, taken from `If-Match` (`"3"`, `W/"3"`, or `3`).
pub fn expected_version(headers: &HeaderMap) -> Result<Option<u64>, EngineError> {
    let Some(raw) = header_text(headers, header::IF_MATCH.as_str())? else {
        return Ok(None);
    };
    let trimmed = raw.trim_start_matches("W/").trim_matches('"');
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EngineError::Validation(format!("If-Match must carry a version, got '{raw}'")))
}

/// Decode an optional JSON body; an empty body yields the default value.
pub fn optional_body<T>(body: &Bytes) -> Result<T, EngineError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    required_body(body)
}

pub fn required_body<T>(body: &Bytes) -> Result<T, EngineError>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(body)
        .map_err(|err| EngineError::Validation(format!("malformed request body: {err}")))
}

pub fn status_code(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::InvalidTransition { .. }
        | EngineError::NotEditable { .. }
        | EngineError::InvariantViolation(_) => StatusCode::CONFLICT,
        EngineError::Conflict(_) => StatusCode::PRECONDITION_FAILED,
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Render an engine error as `{"error": {"code", "message"}}`.
pub fn error_response(err: EngineError) -> Response {
    let status = status_code(&err);
    if status.is_server_error() {
        warn!(code = err.code(), error = %err, "request failed");
    }
    let payload = json!({
        "error": {
            "code": err.code(),
            "message": err.to_string(),
        }
    });
    (status, Json(payload)).into_response()
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, EngineError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| EngineError::Validation(format!("{name} header is not valid text")))
        })
        .transpose()
}
