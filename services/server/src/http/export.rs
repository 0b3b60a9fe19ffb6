//! §6 — staff-only CSV exports. Both write a UTF-8 BOM before the header
//! row, matching `original_source`'s exports so the files open cleanly in
//! Excel.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::{error_response, require_staff};
use crate::repo;
use crate::state::AppState;

const BOM: &str = "\u{FEFF}";

fn csv_response(filename: &str, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        format!("{BOM}{body}"),
    )
        .into_response()
}

/// `GET /export/choices` (§6), grounded on
/// `original_source/endpoint_export_choices.go`.
pub async fn export_choices(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_staff(&state, &headers).await {
        return resp;
    }
    let rows = match repo::choices::export_rows(&state.pool).await {
        Ok(rows) => rows,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    };

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    if let Err(e) = writer.write_record([
        "Student Name",
        "Student ID",
        "Grade/Year",
        "Group/Activity",
        "Container",
        "Section ID",
        "Course ID",
    ]) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
    }
    for row in &rows {
        let student_id = strip_student_email_prefix(&row.student_email);
        if let Err(e) = writer.write_record([
            &row.student_name,
            &student_id,
            &row.year_group,
            &row.course_title,
            &row.course_group,
            &row.section_id,
            &row.course_id,
        ]) {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
        }
    }
    let body = match finish_csv(writer) {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e),
    };
    csv_response("choices.csv", body)
}

/// `GET /export/students` (§6), grounded on
/// `original_source/endpoint_export_students.go`, which writes the raw
/// `email` column straight into the "Student ID" field — unlike
/// `/export/choices`, this endpoint does not derive a numeric id from it.
pub async fn export_students(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = require_staff(&state, &headers).await {
        return resp;
    }
    let rows = match repo::users::list_non_staff(&state.pool).await {
        Ok(rows) => rows,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string()),
    };

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    if let Err(e) = writer.write_record(["Student Name", "Student ID", "Grade/Year", "Confirmed"]) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
    }
    for row in &rows {
        if let Err(e) = writer.write_record([&row.name, &row.email, &row.department, &row.confirmed.to_string()]) {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string());
        }
    }
    let body = match finish_csv(writer) {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e),
    };
    csv_response("students.csv", body)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, String> {
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

/// Student ids are derived from the email local-part, stripping a leading
/// `s`/`S` (e.g. `s123456@school.edu` -> `123456`), grounded on
/// `original_source/endpoint_export_choices.go::studentIDFromEmail`, which
/// does an unconditional `strings.CutPrefix` with no digit check — a local
/// part like `staff.member` comes out as `taff.member` here too.
fn strip_student_email_prefix(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local.strip_prefix(['s', 'S']).unwrap_or(local).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_s_from_numeric_local_part() {
        assert_eq!(strip_student_email_prefix("s123456@school.edu"), "123456");
        assert_eq!(strip_student_email_prefix("S654321@school.edu"), "654321");
    }

    #[test]
    fn strips_a_leading_s_even_from_non_numeric_local_parts() {
        assert_eq!(strip_student_email_prefix("staff.member@school.edu"), "taff.member");
    }
}
