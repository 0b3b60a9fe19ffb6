use cca_protocol::YearGroup;
use sqlx::{PgPool, Row};

use crate::year_group_state::DISABLED;

/// §4.3 `loadState`: defaults missing rows to Disabled and inserts them,
/// matching `original_source/state.go`.
pub async fn load_or_init(pool: &PgPool, yg: YearGroup) -> Result<u8, sqlx::Error> {
    let existing = sqlx::query("SELECT state FROM states WHERE yeargroup = $1")
        .bind(yg.as_str())
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        return Ok(row.get::<i16, _>("state") as u8);
    }

    sqlx::query("INSERT INTO states (yeargroup, state) VALUES ($1, $2)")
        .bind(yg.as_str())
        .bind(DISABLED as i16)
        .execute(pool)
        .await?;
    Ok(DISABLED)
}

pub async fn save(pool: &PgPool, yg: YearGroup, state: u8) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO states (yeargroup, state) VALUES ($1, $2)
           ON CONFLICT (yeargroup) DO UPDATE SET state = EXCLUDED.state"#,
    )
    .bind(yg.as_str())
    .bind(state as i16)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_schedule(
    pool: &PgPool,
    yg: YearGroup,
    schedule: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO states (yeargroup, state, schedule) VALUES ($1, $2, $3)
           ON CONFLICT (yeargroup) DO UPDATE SET schedule = EXCLUDED.schedule"#,
    )
    .bind(yg.as_str())
    .bind(DISABLED as i16)
    .bind(schedule)
    .execute(pool)
    .await?;
    Ok(())
}
