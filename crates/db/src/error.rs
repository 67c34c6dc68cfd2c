use songbook_core::error::CoreError;

/// Error type for repository operations.
///
/// Wraps [`CoreError`] for domain failures (validation, not found, conflict,
/// invalid state) and keeps raw database errors separate.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        DbError::Core(CoreError::NotFound { entity, id })
    }
}

/// Classify a sqlx error from an insert or update.
///
/// PostgreSQL unique violations (code `23505`) on constraints named `uq_*`
/// become [`CoreError::Conflict`]; everything else stays a database error.
pub(crate) fn classify_unique_violation(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            if let Some(constraint) = db_err.constraint() {
                if constraint.starts_with("uq_") {
                    return DbError::Core(CoreError::Conflict(format!(
                        "Duplicate value violates unique constraint: {constraint}"
                    )));
                }
            }
        }
    }
    DbError::Database(err)
}
