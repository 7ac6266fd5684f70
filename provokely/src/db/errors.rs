use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation { message: String },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation { message: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    // SQLite reports the offending columns in the message ("UNIQUE constraint
                    // failed: users.email"), so derive the table from it when the driver can't.
                    let message = db_err.message().to_string();
                    let table = db_err
                        .table()
                        .map(|s| s.to_string())
                        .or_else(|| table_from_sqlite_message(&message));
                    DbError::UniqueViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table,
                        message,
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation {
                        message: db_err.message().to_string(),
                    }
                } else {
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Extract the table name from a SQLite constraint message like
/// `UNIQUE constraint failed: users.email`.
fn table_from_sqlite_message(message: &str) -> Option<String> {
    let (_, columns) = message.split_once("failed: ")?;
    let (table, _) = columns.split_once('.')?;
    Some(table.trim().to_string())
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_from_sqlite_message() {
        assert_eq!(
            table_from_sqlite_message("UNIQUE constraint failed: users.email").as_deref(),
            Some("users")
        );
        assert_eq!(
            table_from_sqlite_message("UNIQUE constraint failed: comments.platform, comments.external_id").as_deref(),
            Some("comments")
        );
        assert_eq!(table_from_sqlite_message("something else"), None);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(DbError::from(sqlx::Error::RowNotFound), DbError::NotFound));
    }
}
