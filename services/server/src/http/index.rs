//! `GET /` (§6) — a role-appropriate minimal shell. Full templating is out
//! of scope (§1); this mirrors the teacher's `fallback_404` inline-HTML
//! style rather than pulling in a template engine for three static pages.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use cca_protocol::YearGroup;

use crate::auth::extract_cookie;
use crate::state::AppState;

pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie = extract_cookie(&headers, &state.config.auth.token);
    let resolved = match cookie {
        Some(value) => crate::auth::resolve_session(&state.pool, &value).await.ok().flatten(),
        None => None,
    };

    match resolved {
        Some((_, YearGroup::Staff)) => Html(STAFF_SHELL).into_response(),
        Some((_, _)) => Html(STUDENT_SHELL).into_response(),
        None => Html(LOGIN_SHELL).into_response(),
    }
}

const LOGIN_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>CCA Selection</title></head>
<body>
  <h1>CCA Selection</h1>
  <p>Please sign in to choose your activities.</p>
  <a href="/auth">Sign in</a>
</body>
</html>"#;

const STUDENT_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>CCA Selection</title></head>
<body>
  <h1>Choose your CCAs</h1>
  <div id="app" data-ws-endpoint="/ws"></div>
</body>
</html>"#;

const STAFF_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>CCA Selection — Staff</title></head>
<body>
  <h1>CCA Administration</h1>
  <ul>
    <li><a href="/export/choices">Export choices (CSV)</a></li>
    <li><a href="/export/students">Export students (CSV)</a></li>
  </ul>
</body>
</html>"#;
