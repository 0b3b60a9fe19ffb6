pub mod auth;
pub mod broadcast_pools;
pub mod cancel_pool;
pub mod config;
pub mod course_table;
pub mod db;
pub mod handlers;
pub mod http;
pub mod repo;
pub mod selection_state;
pub mod state;
pub mod usem;
pub mod ws_session;
pub mod year_group_state;

pub use state::AppState;

use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// `perf.read_header_timeout` (§6) bounds how long a plain HTTP request may
/// take to land before the server gives up on it. Axum/hyper's `serve` has
/// no separate header-read-timeout hook, so this is applied as a
/// whole-request timeout via `tower_http`, the idiomatic equivalent in this
/// stack — scoped to the plain HTTP routes only. `/ws` is deliberately
/// excluded: per §5, WebSocket connections are long-lived and have no
/// per-frame timeout, so wrapping the upgraded connection in the same
/// layer would kill every session after `read_header_timeout` elapsed.
pub fn build_router(state: AppState) -> Router {
    let read_header_timeout = Duration::from_millis(state.config.perf.read_header_timeout_ms);
    let http_routes = Router::new()
        .route("/", get(http::index::index))
        .route("/auth", get(auth::begin_auth).post(auth::handle_auth))
        .route("/state", post(http::admin::set_state))
        .route("/newcourses", post(http::admin::replace_courses))
        .route("/newstudents", post(http::admin::replace_students))
        .route("/newforcedchoices", post(http::admin::replace_forced_choices))
        .route("/export/choices", get(http::export::export_choices))
        .route("/export/students", get(http::export::export_students))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .fallback(fallback_404)
        .layer(TimeoutLayer::new(read_header_timeout))
        .layer(TraceLayer::new_for_http());

    Router::new()
        .route("/ws", get(ws_session::ws_handler))
        .merge(http_routes)
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    (
        axum::http::StatusCode::NOT_FOUND,
        Html(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>404 – Not Found</title></head>
<body>
  <h1>404</h1>
  <p>This page doesn't exist.</p>
  <a href="/">&larr; Back to home</a>
</body>
</html>"#,
        ),
    )
}

mod health {
    use axum::response::IntoResponse;
    pub async fn healthz() -> impl IntoResponse {
        "ok"
    }
    pub async fn readyz() -> impl IntoResponse {
        "ok"
    }
}
