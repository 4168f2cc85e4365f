use custody_core::error::CoreError;

/// PostgreSQL error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Translate a driver error into the domain taxonomy.
///
/// Unique violations on named `uq_` constraints become [`CoreError::Conflict`];
/// everything else is an opaque [`CoreError::Persistence`] with the detail
/// logged here.
pub fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            if let Some(constraint) = db_err.constraint() {
                if constraint.starts_with("uq_") {
                    return CoreError::Conflict(format!(
                        "Duplicate value violates unique constraint '{constraint}'"
                    ));
                }
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Persistence(err.to_string())
}
