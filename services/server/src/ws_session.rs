//! §4.5 — the per-connection session: upgrade, registration in the three
//! process-wide maps, the course-usem watcher fan-out, and the event loop.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use cca_protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::extract_cookie;
use crate::handlers::{self, HandlerError, SessionCtx};
use crate::state::AppState;
use crate::usem::Usem;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookie = extract_cookie(&headers, &state.config.auth.token);
    let resolved = match cookie {
        Some(value) => crate::auth::resolve_session(&state.pool, &value).await,
        None => Ok(None),
    };

    match resolved {
        Ok(Some((user_id, year_group))) => ws
            .protocols(["cca1"])
            .on_upgrade(move |socket| handle_connection(socket, state, user_id, year_group))
            .into_response(),
        Ok(None) => ws
            .protocols(["cca1"])
            .on_upgrade(|socket| reject_unauthenticated(socket))
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "database error resolving session cookie");
            ws.protocols(["cca1"])
                .on_upgrade(|socket| reject_unauthenticated(socket))
                .into_response()
        }
    }
}

/// §4.5 step 1 refusal path: emit `U` and close without ever entering Live.
async fn reject_unauthenticated(mut socket: WebSocket) {
    let _ = socket.send(Message::Text(ServerMessage::Unauthenticated.to_frame().into())).await;
    let _ = socket.close().await;
}

/// Messages the watcher tasks forward to the event loop: "this course's
/// selected count may have changed, go re-read it".
struct CourseWake(i64);

async fn handle_connection(socket: WebSocket, state: AppState, user_id: String, year_group: cca_protocol::YearGroup) {
    if state.year_group_states.get(year_group) == crate::year_group_state::DISABLED {
        terminal_close(socket, "Course selections are disabled for your year group").await;
        return;
    }

    let (token, cancel_id) = state.cancel_pool.register_and_preempt(&user_id);

    let chosen = match crate::selection_state::populate(&state.pool, &user_id).await {
        Ok(chosen) => chosen,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "failed to populate chosen state");
            state.cancel_pool.unregister(&user_id, cancel_id);
            terminal_close(socket, "Internal error").await;
            return;
        }
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(state.config.perf.sendq);
    state.broadcast_pools.register(year_group, &user_id, outbound_tx);

    let (wake_tx, mut wake_rx) = mpsc::channel::<CourseWake>(state.config.perf.sendq);
    let shift = state.config.perf.usem_delay_shift_bits;
    state.courses.connection_opened();

    let mut watchers = Vec::with_capacity(state.courses.num_courses() as usize);
    for course in state.courses.iter() {
        let mut usem = Usem::new();
        course.usems.insert(user_id.clone(), usem.setter());
        let course_id = course.id;
        let wake_tx = wake_tx.clone();
        let watcher_token = token.clone();
        let courses = state.courses.clone();
        watchers.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = watcher_token.cancelled() => break,
                    _ = usem.wait() => {
                        if wake_tx.send(CourseWake(course_id)).await.is_err() {
                            break;
                        }
                        let pause = std::time::Duration::from_millis(courses.active_usem_count() >> shift);
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        }));
    }
    drop(wake_tx);

    info!(user_id = %user_id, year_group = %year_group, "connection established");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<Result<String, ()>>(8);
    let reader = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(Ok(text.to_string())).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    let _ = inbound_tx.send(Err(())).await;
                    break;
                }
                Ok(_) => {}
                Err(_) => {
                    let _ = inbound_tx.send(Err(())).await;
                    break;
                }
            }
        }
    });

    let mut ctx = SessionCtx { user_id: user_id.clone(), year_group, chosen };
    let close_reason = run_event_loop(
        &state,
        &mut ctx,
        &token,
        &mut ws_sink,
        &mut inbound_rx,
        &mut outbound_rx,
        &mut wake_rx,
    )
    .await;

    reader.abort();
    for w in watchers {
        w.abort();
    }
    for course in state.courses.iter() {
        course.usems.remove(&user_id);
    }
    state.courses.connection_closed();
    state.broadcast_pools.unregister(year_group, &user_id);
    state.cancel_pool.unregister(&user_id, cancel_id);

    if let Some(reason) = close_reason {
        let _ = ws_sink
            .send(Message::Text(ServerMessage::Error { reason: reason.clone() }.to_frame().into()))
            .await;
    }
    let _ = ws_sink.close().await;
    info!(user_id = %ctx.user_id, "connection torn down");
}

/// Drives the `tokio::select!` described in §5. Returns `Some(reason)` if
/// the connection should emit a terminal `E :…` frame before closing.
#[allow(clippy::too_many_arguments)]
async fn run_event_loop(
    state: &AppState,
    ctx: &mut SessionCtx,
    token: &CancellationToken,
    ws_sink: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
    inbound_rx: &mut mpsc::Receiver<Result<String, ()>>,
    outbound_rx: &mut mpsc::Receiver<String>,
    wake_rx: &mut mpsc::Receiver<CourseWake>,
) -> Option<String> {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                return Some("Context canceled".to_owned());
            }
            frame = inbound_rx.recv() => {
                match frame {
                    Some(Ok(text)) => {
                        if let Some(reason) = dispatch_frame(state, ctx, ws_sink, &text).await {
                            return Some(reason);
                        }
                    }
                    Some(Err(())) | None => return None,
                }
            }
            msg = outbound_rx.recv() => {
                match msg {
                    Some(text) => {
                        if ws_sink.send(Message::Text(text.into())).await.is_err() {
                            return None;
                        }
                    }
                    None => {}
                }
            }
            wake = wake_rx.recv() => {
                if let Some(CourseWake(course_id)) = wake {
                    if let Some(course) = state.courses.get(course_id) {
                        let frame = ServerMessage::SeatCount {
                            course_id,
                            selected: course.selected.load(Ordering::SeqCst),
                        }
                        .to_frame();
                        if ws_sink.send(Message::Text(frame.into())).await.is_err() {
                            return None;
                        }
                    }
                }
            }
        }
    }
}

async fn dispatch_frame(
    state: &AppState,
    ctx: &mut SessionCtx,
    ws_sink: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
    text: &str,
) -> Option<String> {
    if text.len() > state.config.perf.msg_bytes_cap {
        return Some(format!(
            "frame exceeds configured maximum of {} bytes",
            state.config.perf.msg_bytes_cap
        ));
    }
    let fields = cca_protocol::decode(text);
    if fields.len() > state.config.perf.msg_args_cap {
        return Some(format!(
            "frame exceeds configured maximum of {} fields",
            state.config.perf.msg_args_cap
        ));
    }
    let msg = match ClientMessage::from_fields(&fields) {
        Ok(msg) => msg,
        Err(e) => return Some(e.to_string()),
    };
    match handlers::handle(state, ctx, msg).await {
        Ok(replies) => {
            for reply in replies {
                if ws_sink.send(Message::Text(reply.to_frame().into())).await.is_err() {
                    return None;
                }
            }
            None
        }
        Err(HandlerError::Protocol(reason)) => Some(reason),
        Err(HandlerError::Db(e)) => {
            warn!(user_id = %ctx.user_id, error = %e, "database error on selection hot path");
            Some("database error".to_owned())
        }
    }
}

async fn terminal_close(mut socket: WebSocket, reason: &str) {
    let _ = socket
        .send(Message::Text(ServerMessage::Error { reason: reason.to_owned() }.to_frame().into()))
        .await;
    let _ = socket.close().await;
}
