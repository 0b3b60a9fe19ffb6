//! §4.7 — the HELLO/Y/N/YC/NC protocol handlers.

use cca_protocol::{ClientMessage, CourseType, ServerMessage, YearGroup};
use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;

use crate::repo::RepoError;
use crate::selection_state::ChosenState;
use crate::state::AppState;

pub struct SessionCtx {
    pub user_id: String,
    pub year_group: YearGroup,
    pub chosen: ChosenState,
}

/// Handler errors always terminate the connection (§7 kind (b)/(e)): an
/// unknown command, a bad argument count, an invalid course id, or a
/// database failure on the hot path.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Protocol(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Non-terminal outcomes are returned as the frames to send directly to
/// the acting connection, in command order (§5 ordering guarantee).
pub async fn handle(
    state: &AppState,
    ctx: &mut SessionCtx,
    msg: ClientMessage,
) -> Result<Vec<ServerMessage>, HandlerError> {
    match msg {
        ClientMessage::Hello => handle_hello(state, ctx).await,
        ClientMessage::Choose { course_id } => handle_choose(state, ctx, course_id).await,
        ClientMessage::Unchoose { course_id } => handle_unchoose(state, ctx, course_id).await,
        ClientMessage::Confirm => handle_confirm(state, ctx).await,
        ClientMessage::Unconfirm => handle_unconfirm(state, ctx).await,
    }
}

/// §4.7 HELLO: (i) START/STOP, (ii) YC/NC, (iii) HI.
async fn handle_hello(
    state: &AppState,
    ctx: &SessionCtx,
) -> Result<Vec<ServerMessage>, HandlerError> {
    let mut out = Vec::with_capacity(3);
    out.push(if state.year_group_states.is_open(ctx.year_group) {
        ServerMessage::Start
    } else {
        ServerMessage::Stop
    });

    let user = crate::repo::users::get(&state.pool, &ctx.user_id).await?;
    let confirmed = user.map(|u| u.confirmed).unwrap_or(false);
    out.push(if confirmed {
        ServerMessage::Confirmed
    } else {
        ServerMessage::Unconfirmed
    });

    let course_ids = crate::repo::choices::course_ids_for_user(&state.pool, &ctx.user_id).await?;
    out.push(ServerMessage::Hi { course_ids });
    Ok(out)
}

fn not_open_reply() -> Vec<ServerMessage> {
    vec![ServerMessage::Error {
        reason: "Course selections are not open".to_owned(),
    }]
}

/// §4.7 Y: the compare-and-increment admission protocol.
async fn handle_choose(
    state: &AppState,
    ctx: &mut SessionCtx,
    course_id: i64,
) -> Result<Vec<ServerMessage>, HandlerError> {
    if !state.year_group_states.is_open(ctx.year_group) {
        return Ok(not_open_reply());
    }

    let course = state
        .courses
        .get(course_id)
        .ok_or_else(|| HandlerError::Protocol(format!("invalid course id {course_id}")))?;
    if course.year_groups_bitmask & ctx.year_group.bitmask() == 0 {
        return Err(HandlerError::Protocol(format!(
            "course {course_id} is not offered to {}",
            ctx.year_group
        )));
    }

    if ctx.chosen.groups.contains(&course.group) {
        return Ok(vec![ServerMessage::GroupConflict { course_id }]);
    }

    let mut tx = state.pool.begin().await?;
    let seltime = now_micros();
    match crate::repo::choices::insert(&mut tx, &ctx.user_id, course_id, seltime).await {
        Ok(()) => {}
        Err(RepoError::Duplicate) => {
            // Already chosen; idempotent reply, nothing to commit.
            return Ok(vec![ServerMessage::Accepted { course_id }]);
        }
        Err(RepoError::Other(e)) => return Err(HandlerError::Db(e)),
        Err(RepoError::NotFound(msg)) => return Err(HandlerError::Protocol(msg)),
    }

    let admitted = {
        let _guard = course.selected_lock.lock().await;
        let current = course.selected.load(Ordering::SeqCst);
        if current < course.max {
            course.selected.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    };

    if !admitted {
        tx.rollback().await?;
        return Ok(vec![ServerMessage::Full { course_id }]);
    }

    if let Err(e) = tx.commit().await {
        course.selected.fetch_sub(1, Ordering::SeqCst);
        course.propagate_selected_update();
        return Err(HandlerError::Db(e));
    }

    course.propagate_selected_update();
    ctx.chosen.groups.insert(course.group);
    *ctx.chosen.type_counts.entry(course.course_type).or_insert(0) += 1;

    let mut out = vec![ServerMessage::Accepted { course_id }];
    if state.config.perf.propagate_immediate {
        out.push(ServerMessage::SeatCount {
            course_id,
            selected: course.selected.load(Ordering::SeqCst),
        });
    }
    Ok(out)
}

/// §4.7 N: idempotent unchoose.
async fn handle_unchoose(
    state: &AppState,
    ctx: &mut SessionCtx,
    course_id: i64,
) -> Result<Vec<ServerMessage>, HandlerError> {
    if !state.year_group_states.is_open(ctx.year_group) {
        return Ok(not_open_reply());
    }

    let course = state
        .courses
        .get(course_id)
        .ok_or_else(|| HandlerError::Protocol(format!("invalid course id {course_id}")))?;

    let removed = crate::repo::choices::delete(&state.pool, &ctx.user_id, course_id).await?;
    if removed {
        course.selected.fetch_sub(1, Ordering::SeqCst);
        course.propagate_selected_update();
        if !ctx.chosen.groups.remove(&course.group) {
            error!(
                user_id = %ctx.user_id,
                course_id,
                "course group handling error: group not tracked locally for a removed choice"
            );
        }
        if let Some(count) = ctx.chosen.type_counts.get_mut(&course.course_type) {
            *count = count.saturating_sub(1);
        }
    }
    Ok(vec![ServerMessage::Rejected { course_id }])
}

/// §4.7 YC: confirm, gated on per-type minimums.
async fn handle_confirm(
    state: &AppState,
    ctx: &mut SessionCtx,
) -> Result<Vec<ServerMessage>, HandlerError> {
    if !state.year_group_states.is_open(ctx.year_group) {
        return Ok(not_open_reply());
    }

    for &ctype in &[CourseType::Sport, CourseType::NonSport] {
        let minimum = state.config.req.minimum_for(ctx.year_group, ctype);
        let have = ctx.chosen.type_count(ctype);
        if have < minimum {
            return Ok(vec![ServerMessage::ConfirmRejected {
                reason: format!(
                    "Cannot confirm choices: You chose {have} out of required {minimum} of type {ctype}"
                ),
            }]);
        }
    }

    crate::repo::users::set_confirmed(&state.pool, &ctx.user_id, true).await?;
    Ok(vec![ServerMessage::Confirmed])
}

/// §4.7 NC: unconfirm.
async fn handle_unconfirm(
    state: &AppState,
    ctx: &SessionCtx,
) -> Result<Vec<ServerMessage>, HandlerError> {
    if !state.year_group_states.is_open(ctx.year_group) {
        return Ok(not_open_reply());
    }
    crate::repo::users::set_confirmed(&state.pool, &ctx.user_id, false).await?;
    Ok(vec![ServerMessage::Unconfirmed])
}

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cca_protocol::CourseGroup;

    #[test]
    fn not_open_reply_matches_wire_text() {
        let frames = not_open_reply();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            ServerMessage::Error { reason } => {
                assert_eq!(reason, "Course selections are not open");
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn chosen_state_group_conflict_detection() {
        let mut chosen = ChosenState::default();
        chosen.groups.insert(CourseGroup::Mw1);
        assert!(chosen.groups.contains(&CourseGroup::Mw1));
        assert!(!chosen.groups.contains(&CourseGroup::Mw2));
    }
}
