use sqlx::{PgPool, Row};

/// Sessions are keyed by the cookie value itself (§3 DATA MODEL
/// supplement; `original_source/auth.go`), so a request resolves straight
/// from its `session` cookie without a join through `users`.
pub async fn create(pool: &PgPool, user_id: &str, cookie: &str, expr_epoch: i64) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO sessions (cookie, userid, expr) VALUES ($1, $2, $3)")
        .bind(cookie)
        .bind(user_id)
        .bind(expr_epoch)
        .execute(pool)
        .await?;
    Ok(())
}

pub struct SessionRow {
    pub user_id: String,
    pub expr: i64,
}

pub async fn resolve(pool: &PgPool, cookie: &str) -> Result<Option<SessionRow>, sqlx::Error> {
    let row = sqlx::query("SELECT userid, expr FROM sessions WHERE cookie = $1")
        .bind(cookie)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| SessionRow {
        user_id: r.get("userid"),
        expr: r.get("expr"),
    }))
}
