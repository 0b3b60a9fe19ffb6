use cca_protocol::{CourseGroup, CourseType};
use sqlx::{PgPool, Row};

use crate::course_table::CourseRow;

/// Startup/reload read: catalog joined against a per-course count of
/// `choices` rows, per §4.2 `loadAll`.
pub async fn load_all_with_selected_counts(pool: &PgPool) -> Result<Vec<CourseRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT c.id, c.nmax, c.title, c.teacher, c.location, c.course_id,
                  c.section_id, c.ctype, c.cgroup, c.year_groups,
                  (SELECT COUNT(*) FROM choices ch WHERE ch.courseid = c.id) AS selected
           FROM courses c"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let course_type = CourseType::parse(r.get::<String, _>("ctype").as_str())?;
            let group = CourseGroup::parse(r.get::<String, _>("cgroup").as_str())?;
            Some(CourseRow {
                id: r.get("id"),
                max: r.get::<i32, _>("nmax") as u32,
                title: r.get("title"),
                teacher: r.get("teacher"),
                location: r.get("location"),
                course_id: r.get("course_id"),
                section_id: r.get("section_id"),
                course_type,
                group,
                year_groups_bitmask: r.get::<i16, _>("year_groups") as u8,
                selected: r.get::<i64, _>("selected") as u32,
            })
        })
        .collect())
}

pub struct NewCourseRow<'a> {
    pub max: u32,
    pub title: &'a str,
    pub teacher: &'a str,
    pub location: &'a str,
    pub course_id: &'a str,
    pub section_id: &'a str,
    pub course_type: CourseType,
    pub group: CourseGroup,
    pub year_groups_bitmask: u8,
}

/// §4.9 catalog replacement: runs inside the caller's transaction.
/// `delete_all` truncates `choices` then `courses` (in that order, to
/// satisfy the foreign key); `insert` adds one row per validated CSV line.
/// The internal `id` is database-assigned (`BIGSERIAL`), matching
/// `original_source/endpoint_newcourses.go`'s insert, which never supplies
/// one — only the external `course_id`/`section_id` come from the CSV.
pub async fn delete_all(tx: &mut sqlx::PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM choices").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM courses").execute(&mut *tx).await?;
    Ok(())
}

pub async fn insert(tx: &mut sqlx::PgConnection, row: &NewCourseRow<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO courses
             (nmax, title, teacher, location, course_id, section_id, ctype, cgroup, year_groups)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(row.max as i32)
    .bind(row.title)
    .bind(row.teacher)
    .bind(row.location)
    .bind(row.course_id)
    .bind(row.section_id)
    .bind(row.course_type.as_str())
    .bind(row.group.as_str())
    .bind(row.year_groups_bitmask as i16)
    .execute(&mut *tx)
    .await?;
    Ok(())
}
