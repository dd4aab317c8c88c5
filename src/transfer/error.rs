//! Transfer Error Types

use std::time::Duration;
use thiserror::Error;

use crate::ledger::LedgerError;

/// Transfer error types
///
/// Every failure leaves no partial effect: the unit of work is rolled back
/// before the error reaches the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors (no store call made) ===
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // === Account Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        required: i64,
    },

    // === Retryable Errors (retry the whole transfer) ===
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    // === System Errors ===
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidArgument(_) => "INVALID_ARGUMENT",
            TransferError::NotFound(_) => "NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::Conflict(_) => "CONFLICT",
            TransferError::Unavailable(_) => "UNAVAILABLE",
            TransferError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            TransferError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            TransferError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the caller may retry the whole transfer.
    ///
    /// A retry creates a new, distinct transfer: the engine does not deduplicate.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::Conflict(_)
                | TransferError::Unavailable(_)
                | TransferError::DeadlineExceeded(_)
        )
    }
}

impl From<LedgerError> for TransferError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(msg) => TransferError::NotFound(msg),
            LedgerError::InvalidArgument(msg) => TransferError::InvalidArgument(msg),
            LedgerError::Conflict(msg) => TransferError::Conflict(msg),
            LedgerError::Unavailable(msg) => TransferError::Unavailable(msg),
            LedgerError::Database(msg) => TransferError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TransferError::InvalidArgument("x".into()).code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(
            TransferError::InsufficientFunds {
                account_id: 1,
                balance: 0,
                required: 5
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
        assert_eq!(
            TransferError::DeadlineExceeded(Duration::from_millis(10)).code(),
            "DEADLINE_EXCEEDED"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(TransferError::Conflict("deadlock detected".into()).is_retryable());
        assert!(TransferError::Unavailable("pool timed out".into()).is_retryable());
        assert!(TransferError::DeadlineExceeded(Duration::from_secs(1)).is_retryable());

        assert!(!TransferError::NotFound("account 1".into()).is_retryable());
        assert!(!TransferError::InvalidArgument("amount".into()).is_retryable());
        assert!(!TransferError::Internal("decode".into()).is_retryable());
    }

    #[test]
    fn test_from_ledger_error_keeps_cause() {
        let err = TransferError::from(LedgerError::Conflict("could not serialize access".into()));
        assert_eq!(
            err,
            TransferError::Conflict("could not serialize access".into())
        );

        let err = TransferError::from(LedgerError::Database("bad row".into()));
        assert_eq!(err.to_string(), "Internal error: bad row");
    }

    #[test]
    fn test_display() {
        let err = TransferError::InsufficientFunds {
            account_id: 3,
            balance: 10,
            required: 30,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in account 3: balance 10, required 30"
        );
    }
}
