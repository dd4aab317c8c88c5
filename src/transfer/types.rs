//! Transfer Core Types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::TransferError;
use crate::ledger::{Account, AccountId, Entry, Transfer};

/// Inbound transfer request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Minor units, must be positive
    pub amount: i64,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Structural checks, made before any store call
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.amount <= 0 {
            return Err(TransferError::InvalidArgument(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.from_account_id == self.to_account_id {
            return Err(TransferError::InvalidArgument(format!(
                "source and destination account are the same ({})",
                self.from_account_id
            )));
        }
        Ok(())
    }
}

/// Read-back of everything one committed transfer wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    /// Source account after the debit
    pub from_account: Account,
    /// Destination account after the credit
    pub to_account: Account,
}

/// Per-call context: correlation id for logs and an optional deadline.
///
/// Passed explicitly; nothing is looked up from ambient task state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
    pub deadline: Option<Duration>,
}

impl RequestContext {
    /// Fresh context with a ULID correlation id and no deadline
    pub fn new() -> Self {
        Self {
            correlation_id: ulid::Ulid::new().to_string(),
            deadline: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_positive_distinct() {
        assert!(TransferParams::new(1, 2, 1).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        for amount in [0, -1, i64::MIN] {
            let err = TransferParams::new(1, 2, amount).validate().unwrap_err();
            assert!(matches!(err, TransferError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_validate_rejects_same_account() {
        let err = TransferParams::new(7, 7, 10).validate().unwrap_err();
        assert!(matches!(err, TransferError::InvalidArgument(_)));
    }

    #[test]
    fn test_context_ids_are_unique() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.correlation_id, b.correlation_id);
        assert!(a.deadline.is_none());

        let c = RequestContext::new()
            .with_correlation_id("tx 1")
            .with_deadline(Duration::from_millis(250));
        assert_eq!(c.correlation_id, "tx 1");
        assert_eq!(c.deadline, Some(Duration::from_millis(250)));
    }
}
