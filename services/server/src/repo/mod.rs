pub mod choices;
pub mod courses;
pub mod roster;
pub mod sessions;
pub mod states;
pub mod users;

/// §4.8 — the persistence adapter maps unique-violation errors to a
/// distinguishable sentinel so handlers can branch without string
/// matching. `original_source/wsmsg_choose.go` matches Postgres code
/// `23505` specifically.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("duplicate row")]
    Duplicate,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] sqlx::Error),
}

pub(crate) fn classify(err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return RepoError::Duplicate;
        }
    }
    RepoError::Other(err)
}
