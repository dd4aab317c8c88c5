//! Ledger Store Error Types

use thiserror::Error;

/// PostgreSQL SQLSTATE codes the store classifies
pub mod sqlstate {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
    pub const QUERY_CANCELED: &str = "57014";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
}

/// Errors raised by a ledger store.
///
/// Store implementations classify their native failures into these variants
/// so the engine can report them without knowing the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization failure, deadlock or lock wait timeout
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection, pool or transport failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    pub fn account_not_found(id: i64) -> Self {
        LedgerError::NotFound(format!("account {} does not exist", id))
    }

    /// Get the error code for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InvalidArgument(_) => "INVALID_ARGUMENT",
            LedgerError::Conflict(_) => "CONFLICT",
            LedgerError::Unavailable(_) => "UNAVAILABLE",
            LedgerError::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => LedgerError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some(sqlstate::SERIALIZATION_FAILURE)
                | Some(sqlstate::DEADLOCK_DETECTED)
                | Some(sqlstate::LOCK_NOT_AVAILABLE)
                | Some(sqlstate::QUERY_CANCELED) => LedgerError::Conflict(db.message().to_string()),
                Some(sqlstate::FOREIGN_KEY_VIOLATION) => {
                    LedgerError::NotFound(format!("referenced account: {}", db.message()))
                }
                Some(sqlstate::CHECK_VIOLATION) => {
                    LedgerError::InvalidArgument(db.message().to_string())
                }
                _ => LedgerError::Database(db.to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => LedgerError::Unavailable(e.to_string()),
            _ => LedgerError::Database(e.to_string()),
        }
    }
}
