//! Ledger Store Traits
//!
//! The store is split into three narrow capability sets (accounts, entries,
//! transfers) that are all implemented by a unit of work ([`LedgerTx`]).
//! Every call made through a `LedgerTx` belongs to the same atomic unit:
//! either everything is published by [`LedgerTx::commit`], or nothing is.
//!
//! Dropping a `LedgerTx` without committing rolls it back and releases
//! every row lock it holds.

use async_trait::async_trait;

use super::error::LedgerError;
use super::models::{Account, AccountId, Entry, EntryId, NewAccount, Page, Transfer, TransferId};

/// Account operations within a unit of work
#[async_trait]
pub trait AccountStore: Send {
    async fn create_account(&mut self, params: &NewAccount) -> Result<Account, LedgerError>;

    /// Plain read, no row lock
    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError>;

    /// Read the account and hold its row lock until the unit of work ends
    async fn lock_account(&mut self, id: AccountId) -> Result<Account, LedgerError>;

    async fn list_accounts(&mut self, page: Page) -> Result<Vec<Account>, LedgerError>;

    /// Atomically add `delta` to the balance and return the updated row.
    ///
    /// A single statement against the store: concurrent increments on the
    /// same account never lose an update. Takes the row lock if not held.
    async fn add_balance(&mut self, id: AccountId, delta: i64) -> Result<Account, LedgerError>;
}

/// Entry operations within a unit of work
#[async_trait]
pub trait EntryStore: Send {
    async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, LedgerError>;

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, LedgerError>;

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, LedgerError>;
}

/// Transfer operations within a unit of work
#[async_trait]
pub trait TransferStore: Send {
    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<Transfer, LedgerError>;

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, LedgerError>;

    /// Transfers where `from_account_id = from` OR `to_account_id = to`, by id
    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, LedgerError>;
}

/// A begin/commit/rollback-scoped unit of work
#[async_trait]
pub trait LedgerTx: AccountStore + EntryStore + TransferStore {
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Factory for units of work
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError>;
}
