//! Transfer Coordinator
//!
//! Global lock ordering for the two accounts touched by a transfer.
//!
//! Both row locks are taken lowest account id first, and the balance
//! increments are applied in the same order, whatever the transfer
//! direction. Two opposite transfers between the same pair therefore queue
//! on the same first lock instead of each holding one lock and waiting on
//! the other.

use tracing::debug;

use super::error::TransferError;
use crate::ledger::{Account, AccountId, AccountStore};

/// Lock acquisition plan for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOrder {
    first: AccountId,
    second: AccountId,
    from: AccountId,
}

impl LockOrder {
    pub fn new(from: AccountId, to: AccountId) -> Self {
        let (first, second) = if from <= to { (from, to) } else { (to, from) };
        Self {
            first,
            second,
            from,
        }
    }

    /// Account ids in acquisition order
    pub fn sequence(&self) -> [AccountId; 2] {
        [self.first, self.second]
    }

    /// Lock both rows in order. Returns `(from_account, to_account)`.
    pub async fn acquire<S>(&self, store: &mut S) -> Result<(Account, Account), TransferError>
    where
        S: AccountStore + ?Sized,
    {
        let first = store.lock_account(self.first).await?;
        debug!(account_id = self.first, "Row lock acquired");
        let second = store.lock_account(self.second).await?;
        debug!(account_id = self.second, "Row lock acquired");

        Ok(self.by_direction(first, second))
    }

    /// Debit `from` and credit `to` by `amount`, in lock order.
    /// Returns the updated `(from_account, to_account)`.
    pub async fn add_balances<S>(
        &self,
        store: &mut S,
        amount: i64,
    ) -> Result<(Account, Account), TransferError>
    where
        S: AccountStore + ?Sized,
    {
        let first = store
            .add_balance(self.first, self.delta_for(self.first, amount))
            .await?;
        let second = store
            .add_balance(self.second, self.delta_for(self.second, amount))
            .await?;

        Ok(self.by_direction(first, second))
    }

    fn delta_for(&self, account_id: AccountId, amount: i64) -> i64 {
        if account_id == self.from {
            -amount
        } else {
            amount
        }
    }

    fn by_direction(&self, first: Account, second: Account) -> (Account, Account) {
        if self.first == self.from {
            (first, second)
        } else {
            (second, first)
        }
    }
}
