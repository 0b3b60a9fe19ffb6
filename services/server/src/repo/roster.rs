use sqlx::{PgPool, Row};

pub struct ExpectedStudentRow {
    pub id: i32,
    pub name: String,
    pub legal_sex: String,
}

/// §4.9 roster admin: wholesale replace, grounded on
/// `original_source/endpoint_newstudents.go`.
pub async fn replace_expected_students(
    pool: &PgPool,
    rows: &[ExpectedStudentRow],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM expected_students").execute(&mut *tx).await?;
    for row in rows {
        sqlx::query("INSERT INTO expected_students (id, name, legal_sex) VALUES ($1, $2, $3)")
            .bind(row.id)
            .bind(&row.name)
            .bind(&row.legal_sex)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn list_expected_students(pool: &PgPool) -> Result<Vec<ExpectedStudentRow>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, name, legal_sex FROM expected_students ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| ExpectedStudentRow {
            id: r.get("id"),
            name: r.get("name"),
            legal_sex: r.get("legal_sex"),
        })
        .collect())
}

pub struct PreSelectedRow {
    pub student_id: i64,
    pub section_id: String,
}

/// §4.9 forced-choices admin: wholesale replace, grounded on
/// `original_source/endpoint_newforcedchoices.go`, whose CSV pairs a
/// student id with a course's *section* id, resolved to the course's
/// internal primary key at insert time via a `SELECT id FROM courses
/// WHERE section_id = $2` subquery. Ingestion and storage only — no
/// automatic application against live capacity (DESIGN.md Open Question
/// decision #3).
pub async fn replace_pre_selected(
    pool: &PgPool,
    rows: &[PreSelectedRow],
) -> Result<(), crate::repo::RepoError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM pre_selected").execute(&mut *tx).await?;
    for row in rows {
        let course_id: Option<i64> = sqlx::query_scalar("SELECT id FROM courses WHERE section_id = $1")
            .bind(&row.section_id)
            .fetch_optional(&mut *tx)
            .await?;
        let course_id = course_id
            .ok_or_else(|| crate::repo::RepoError::NotFound(format!("unknown section id {:?}", row.section_id)))?;
        sqlx::query("INSERT INTO pre_selected (student_id, course_id) VALUES ($1, $2)")
            .bind(row.student_id)
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}
