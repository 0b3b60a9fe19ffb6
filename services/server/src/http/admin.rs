//! §4.9 / §6 — staff-only catalog, roster, and state-machine admin
//! endpoints.

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use cca_protocol::{CourseGroup, CourseType, YearGroup};
use serde::Deserialize;
use std::collections::HashMap;

use super::{error_response, require_staff};
use crate::repo;
use crate::state::AppState;
use crate::year_group_state::{DISABLED, OPEN, READ_ONLY};

/// `POST /state` — per-year-group transitions, form fields
/// `yeargroup_<YG>=<0|1|2>` and optional `schedule_<YG>`.
pub async fn set_state(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = require_staff(&state, &headers).await {
        return resp;
    }

    for &yg in &YearGroup::SELECTABLE {
        let Some(raw) = fields.get(&format!("yeargroup_{yg}")) else {
            continue;
        };
        let new_state = match raw.as_str() {
            "0" => DISABLED,
            "1" => READ_ONLY,
            "2" => OPEN,
            other => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "BAD_REQUEST",
                    format!("invalid state '{other}' for {yg}"),
                )
            }
        };
        if let Err(e) = state
            .year_group_states
            .set_state(&state.pool, &state.broadcast_pools, yg, new_state)
            .await
        {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
        }

        if let Some(schedule_raw) = fields.get(&format!("schedule_{yg}")) {
            let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(schedule_raw) else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "BAD_REQUEST",
                    format!("invalid schedule timestamp for {yg}"),
                );
            };
            if let Err(e) = repo::states::set_schedule(&state.pool, yg, Some(parsed.with_timezone(&chrono::Utc))).await {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
            }
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Deserialize)]
struct CourseCsvRow {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Max")]
    max: u32,
    #[serde(rename = "Teacher")]
    teacher: String,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Type")]
    course_type: String,
    #[serde(rename = "Group")]
    group: String,
    #[serde(rename = "Section ID")]
    section_id: String,
    #[serde(rename = "Course ID")]
    course_id: String,
}

/// The catalog CSV (§6) has no year-group column — `original_source` has
/// no per-course year-group filtering at all. Every ingested course is
/// offered to all four selectable year groups.
const DEFAULT_YEAR_GROUPS_BITMASK: u8 = 0b1111;

/// `POST /newcourses` — wholesale catalog replacement (§4.2/§4.9), gated on
/// every year group being Disabled.
pub async fn replace_courses(State(state): State<AppState>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(resp) = require_staff(&state, &headers).await {
        return resp;
    }
    if !state.year_group_states.all_disabled() {
        return error_response(
            StatusCode::CONFLICT,
            "CONFLICT",
            "catalog replacement requires every year group to be Disabled",
        );
    }

    let bytes = match read_csv_field(&mut multipart).await {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };

    let mut rows = Vec::new();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    for record in reader.deserialize::<CourseCsvRow>() {
        let record = match record {
            Ok(r) => r,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", format!("malformed CSV row: {e}")),
        };
        let Some(course_type) = CourseType::parse(&record.course_type) else {
            return error_response(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("unknown course type '{}'", record.course_type),
            );
        };
        let Some(group) = CourseGroup::parse(&record.group) else {
            return error_response(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("unknown course group '{}'", record.group),
            );
        };
        rows.push((record, course_type, group));
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    };
    if let Err(e) = repo::courses::delete_all(&mut tx).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
    }
    for (record, course_type, group) in &rows {
        let new_row = repo::courses::NewCourseRow {
            max: record.max,
            title: &record.title,
            teacher: &record.teacher,
            location: &record.location,
            course_id: &record.course_id,
            section_id: &record.section_id,
            course_type: *course_type,
            group: *group,
            year_groups_bitmask: DEFAULT_YEAR_GROUPS_BITMASK,
        };
        if let Err(e) = repo::courses::insert(&mut tx, &new_row).await {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
        }
    }
    if let Err(e) = tx.commit().await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
    }

    if let Err(e) = state.courses.replace_all(&state.pool).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
    }

    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Deserialize)]
struct StudentCsvRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ID")]
    id: i32,
    #[serde(rename = "Legal Sex")]
    legal_sex: String,
}

/// `POST /newstudents` — wholesale expected-student roster replacement.
pub async fn replace_students(State(state): State<AppState>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(resp) = require_staff(&state, &headers).await {
        return resp;
    }

    let bytes = match read_csv_field(&mut multipart).await {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };

    let mut rows = Vec::new();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    for record in reader.deserialize::<StudentCsvRow>() {
        let record = match record {
            Ok(r) => r,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", format!("malformed CSV row: {e}")),
        };
        rows.push(repo::roster::ExpectedStudentRow {
            id: record.id,
            name: record.name,
            legal_sex: record.legal_sex,
        });
    }

    if let Err(e) = repo::roster::replace_expected_students(&state.pool, &rows).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Deserialize)]
struct ForcedChoiceCsvRow {
    #[serde(rename = "Student ID")]
    student_id: i64,
    #[serde(rename = "Section ID")]
    section_id: String,
}

/// `POST /newforcedchoices` — wholesale forced-enrollment staging table
/// replacement. Ingestion and storage only; see DESIGN.md for the Open
/// Question on application semantics.
pub async fn replace_forced_choices(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(resp) = require_staff(&state, &headers).await {
        return resp;
    }

    let bytes = match read_csv_field(&mut multipart).await {
        Ok(bytes) => bytes,
        Err(resp) => return resp,
    };

    let mut rows = Vec::new();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    for record in reader.deserialize::<ForcedChoiceCsvRow>() {
        let record = match record {
            Ok(r) => r,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", format!("malformed CSV row: {e}")),
        };
        rows.push(repo::roster::PreSelectedRow {
            student_id: record.student_id,
            section_id: record.section_id,
        });
    }

    if let Err(e) = repo::roster::replace_pre_selected(&state.pool, &rows).await {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn read_csv_field(multipart: &mut Multipart) -> Result<Vec<u8>, Response> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string()))?;
        let Some(field) = field else {
            return Err(error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", "missing multipart CSV field"));
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", e.to_string()))?;
        return Ok(data.to_vec());
    }
}
