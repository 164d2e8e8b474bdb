//! Error types for sqlgate-pg

use sqlgate::{DriverError, SchemaError};
use thiserror::Error;

/// Result type for sqlgate-pg operations.
pub type PgResult<T> = Result<T, PgError>;

/// Error type for sqlgate-pg operations.
#[derive(Debug, Error)]
pub enum PgError {
    /// Database error from tokio-postgres.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    /// Could not get a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(String),
    /// Decode error when reading a column.
    #[error("Decode error for column '{column}': {message}")]
    Decode { column: String, message: String },
    /// The catalog or a statement uses something this crate cannot handle.
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// The catalog does not form a valid schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    /// Invalid driver configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PgError {
    /// Create a decode error.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        PgError::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// SQLSTATE code, for errors reported by the server.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            PgError::Database(e) => e.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }
}

impl From<PgError> for DriverError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Database(e) => match e.as_db_error() {
                Some(db) => DriverError::Database(format!("{} ({})", db.message(), db.code().code())),
                None => DriverError::Database(e.to_string()),
            },
            PgError::Pool(message) => DriverError::Other(format!("pool: {message}")),
            PgError::Decode { column, message } => DriverError::Decode { column, message },
            PgError::Unsupported(message) => DriverError::Unsupported(message),
            PgError::Schema(e) => DriverError::Other(format!("catalog: {e}")),
            PgError::Config(message) => DriverError::Other(format!("config: {message}")),
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for PgError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(e) => PgError::Database(e),
            other => PgError::Pool(other.to_string()),
        }
    }
}
