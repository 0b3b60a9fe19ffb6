use sqlx::{PgPool, Row};

use super::{classify, RepoError};

/// §4.7 Y step 2: attempt the insert inside the caller's transaction. A
/// unique-violation (user already chose this course) classifies to
/// `RepoError::Duplicate` so the handler can reply idempotently without
/// string-matching the database error.
pub async fn insert(
    tx: &mut sqlx::PgConnection,
    user_id: &str,
    course_id: i64,
    seltime_micros: i64,
) -> Result<(), RepoError> {
    sqlx::query("INSERT INTO choices (userid, courseid, seltime) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(course_id)
        .bind(seltime_micros)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
    Ok(())
}

/// §4.7 N step 1: returns whether a row was actually deleted, for the
/// idempotent-reply-either-way semantics.
pub async fn delete(pool: &PgPool, user_id: &str, course_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM choices WHERE userid = $1 AND courseid = $2")
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn course_ids_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<i64>, sqlx::Error> {
    let rows = sqlx::query("SELECT courseid FROM choices WHERE userid = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.get("courseid")).collect())
}

pub struct ChoiceExportRow {
    pub student_name: String,
    pub student_email: String,
    pub year_group: String,
    pub course_title: String,
    pub course_group: String,
    pub section_id: String,
    pub course_id: String,
}

/// `GET /export/choices` (§6), grounded on
/// `original_source/endpoint_export_choices.go`: one row per choice,
/// joined against `users` and `courses` for display fields.
pub async fn export_rows(pool: &PgPool) -> Result<Vec<ChoiceExportRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT u.name AS student_name, u.email AS student_email, u.department AS year_group,
                  c.title AS course_title, c.cgroup AS course_group,
                  c.section_id AS section_id, c.course_id AS course_id
           FROM choices ch
           JOIN users u ON u.id = ch.userid
           JOIN courses c ON c.id = ch.courseid
           ORDER BY u.name, c.title"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| ChoiceExportRow {
            student_name: r.get("student_name"),
            student_email: r.get("student_email"),
            year_group: r.get("year_group"),
            course_title: r.get("course_title"),
            course_group: r.get("course_group"),
            section_id: r.get("section_id"),
            course_id: r.get("course_id"),
        })
        .collect())
}
