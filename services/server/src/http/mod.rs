//! HTTP endpoint glue (§6): the unauthenticated index, and the staff-only
//! admin/export endpoints.

pub mod admin;
pub mod export;
pub mod index;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cca_protocol::{HttpErrorEnvelope, YearGroup};

use crate::auth::extract_cookie;
use crate::state::AppState;

pub(crate) fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(HttpErrorEnvelope::new(code, message))).into_response()
}

/// Resolves the session cookie and requires the caller to be staff — the
/// `yearGroup == "Staff"` gate every admin endpoint in `original_source`
/// applies before doing anything else.
pub(crate) async fn require_staff(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    let Some(cookie) = extract_cookie(headers, &state.config.auth.token) else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
            "missing session cookie",
        ));
    };
    let resolved = crate::auth::resolve_session(&state.pool, &cookie)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()))?;
    match resolved {
        Some((user_id, YearGroup::Staff)) => Ok(user_id),
        Some(_) => Err(error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "staff access required")),
        None => Err(error_response(
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
            "invalid or expired session",
        )),
    }
}
