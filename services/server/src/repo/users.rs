use sqlx::{PgPool, Row};

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub confirmed: bool,
}

/// Login-time upsert, grounded on `original_source/auth.go::handleAuth`
/// (insert; on unique-violation, a follow-up update of name/email).
pub async fn upsert(
    pool: &PgPool,
    id: &str,
    name: &str,
    email: &str,
    department: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO users (id, name, email, department) VALUES ($1, $2, $3, $4)
           ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email,
               department = EXCLUDED.department"#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(department)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, email, department, confirmed FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| UserRow {
        id: r.get("id"),
        name: r.get("name"),
        email: r.get("email"),
        department: r.get("department"),
        confirmed: r.get("confirmed"),
    }))
}

pub async fn set_confirmed(pool: &PgPool, id: &str, confirmed: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET confirmed = $1 WHERE id = $2")
        .bind(confirmed)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// `GET /export/students` (§6), grounded on
/// `original_source/endpoint_export_students.go`: every logged-in user
/// excluding staff accounts.
pub async fn list_non_staff(pool: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, name, email, department, confirmed FROM users WHERE department <> 'Staff' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| UserRow {
            id: r.get("id"),
            name: r.get("name"),
            email: r.get("email"),
            department: r.get("department"),
            confirmed: r.get("confirmed"),
        })
        .collect())
}
