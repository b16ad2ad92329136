//! Error types for the migration runner
//!
//! Errors raised by the database driver, the file system or a script
//! migration are carried unchanged so callers see the original message.

use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Error returned by the database driver
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Directory listing or file read failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A script migration body failed
    #[error(transparent)]
    Script(#[from] anyhow::Error),

    /// Query failure reported by a backend without a native error type
    #[error("{0}")]
    Query(String),

    /// No loader is registered for a recognized migration type
    #[error("no loader registered for '{extension}' migrations (file: {filename})")]
    NoLoader { filename: String, extension: String },

    /// A script registry has no body for the given file
    #[error("no migration body registered for '{0}'")]
    ScriptNotFound(String),

    /// The transaction was already committed or rolled back
    #[error("transaction already completed")]
    TransactionCompleted,

    /// Column missing from a result row
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// Value could not be decoded into the requested type
    #[error("failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Invalid database URL
    #[error("invalid database URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error(transparent)]
    Configuration(#[from] crate::config::ConfigError),
}

impl MigrationError {
    /// SQLSTATE code of a database error, if the driver reported one
    pub fn sqlstate(&self) -> Option<String> {
        match self {
            MigrationError::Database(sqlx::Error::Database(db)) => {
                db.code().map(|code| code.into_owned())
            }
            _ => None,
        }
    }

    /// Whether this error came from the database while running a statement
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            MigrationError::Database(sqlx::Error::Database(_)) | MigrationError::Query(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_is_transparent() {
        let err: MigrationError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory").into();
        assert_eq!(err.to_string(), "no such directory");
        assert!(err.sqlstate().is_none());
        assert!(!err.is_database_error());
    }

    #[test]
    fn test_script_error_keeps_message() {
        let err: MigrationError = anyhow::anyhow!("seed data missing").into();
        assert_eq!(err.to_string(), "seed data missing");
    }

    #[test]
    fn test_query_error_is_database_error() {
        let err = MigrationError::Query("division by zero".to_string());
        assert!(err.is_database_error());
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn test_no_loader_message() {
        let err = MigrationError::NoLoader {
            filename: "002_seed.js".to_string(),
            extension: "js".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no loader registered for 'js' migrations (file: 002_seed.js)"
        );
    }
}
