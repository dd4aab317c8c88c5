//! Ledger Service
//!
//! Account, entry and transfer reads/writes outside the transfer engine.
//! Every call runs in its own unit of work.

use std::sync::Arc;
use tracing::{info, warn};

use super::error::LedgerError;
use super::models::{Account, AccountId, Entry, EntryId, NewAccount, Page, Transfer, TransferId};
use super::store::{AccountStore, EntryStore, Ledger, LedgerTx, TransferStore};

pub struct LedgerService {
    ledger: Arc<dyn Ledger>,
}

impl LedgerService {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn create_account(&self, params: NewAccount) -> Result<Account, LedgerError> {
        params.validate()?;

        let mut tx = self.ledger.begin().await?;
        let result = tx.create_account(&params).await;
        let account = finish(tx, result).await?;

        info!(
            account_id = account.id,
            owner = %account.owner,
            currency = %account.currency,
            "Account created"
        );
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx.get_account(id).await;
        finish(tx, result).await
    }

    pub async fn list_accounts(&self, page: Page) -> Result<Vec<Account>, LedgerError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx.list_accounts(page).await;
        finish(tx, result).await
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, LedgerError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx.get_entry(id).await;
        finish(tx, result).await
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, LedgerError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx.list_entries(account_id, page).await;
        finish(tx, result).await
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx.get_transfer(id).await;
        finish(tx, result).await
    }

    /// Transfers sent by `from_account_id` or received by `to_account_id`
    pub async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx
            .list_transfers(from_account_id, to_account_id, page)
            .await;
        finish(tx, result).await
    }
}

/// Commit on success, roll back on failure
async fn finish<T>(
    tx: Box<dyn LedgerTx>,
    result: Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "Rollback failed");
            }
            Err(e)
        }
    }
}
