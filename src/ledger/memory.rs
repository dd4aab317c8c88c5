//! In-Memory Ledger Store
//!
//! Honours the same contract as the PostgreSQL store:
//! - writes are staged inside the unit of work and published on commit
//! - every account has a row lock; `lock_account` and `add_balance` hold it
//!   until the unit of work ends
//! - lock waits are bounded by `lock_timeout` and surface as `Conflict`
//!   (the analogue of PostgreSQL `lock_timeout` / deadlock detection)
//! - ids come from sequences and are never reused, even after rollback
//!
//! Faults can be injected per operation to fail a unit of work at any step.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use super::error::LedgerError;
use super::models::{Account, AccountId, Entry, EntryId, NewAccount, Page, Transfer, TransferId};
use super::store::{AccountStore, EntryStore, Ledger, LedgerTx, TransferStore};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

type RowLock = Arc<tokio::sync::Mutex<()>>;

/// Operation at which an injected fault fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateTransfer,
    CreateEntry,
    AddBalance,
    Commit,
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<EntryId, Entry>,
    transfers: BTreeMap<TransferId, Transfer>,
    row_locks: HashMap<AccountId, RowLock>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

struct Shared {
    tables: Mutex<Tables>,
    faults: Mutex<HashMap<FaultPoint, LedgerError>>,
    lock_timeout: Duration,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire (and clear) the fault armed for `point`, if any
    fn check_fault(&self, point: FaultPoint) -> Result<(), LedgerError> {
        let armed = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&point);

        match armed {
            Some(err) => {
                debug!(?point, error = %err, "Injected fault fired");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

/// Process-local ledger with PostgreSQL-like transactional semantics
#[derive(Clone)]
pub struct MemoryLedger {
    shared: Arc<Shared>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                faults: Mutex::new(HashMap::new()),
                lock_timeout,
            }),
        }
    }

    /// Make the next call reaching `point` fail with `error` (one-shot)
    pub fn fail_next(&self, point: FaultPoint, error: LedgerError) {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point, error);
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        Ok(Box::new(MemoryLedgerTx {
            shared: self.shared.clone(),
            held_locks: HashMap::new(),
            new_accounts: BTreeMap::new(),
            deltas: BTreeMap::new(),
            new_entries: Vec::new(),
            new_transfers: Vec::new(),
        }))
    }
}

/// Unit of work on a [`MemoryLedger`]. Dropping it discards staged writes
/// and releases its row locks.
pub struct MemoryLedgerTx {
    shared: Arc<Shared>,
    held_locks: HashMap<AccountId, OwnedMutexGuard<()>>,
    new_accounts: BTreeMap<AccountId, Account>,
    deltas: BTreeMap<AccountId, i64>,
    new_entries: Vec<Entry>,
    new_transfers: Vec<Transfer>,
}

impl MemoryLedgerTx {
    /// Account as seen by this unit of work: committed or staged row plus own deltas
    fn view_account(&self, id: AccountId) -> Option<Account> {
        let base = match self.new_accounts.get(&id) {
            Some(staged) => Some(staged.clone()),
            None => self.shared.tables().accounts.get(&id).cloned(),
        };

        base.map(|mut account| {
            account.balance += self.deltas.get(&id).copied().unwrap_or(0);
            account
        })
    }

    fn account_exists(&self, id: AccountId) -> bool {
        self.new_accounts.contains_key(&id) || self.shared.tables().accounts.contains_key(&id)
    }

    async fn acquire_row_lock(&mut self, id: AccountId) -> Result<(), LedgerError> {
        if self.held_locks.contains_key(&id) || self.new_accounts.contains_key(&id) {
            return Ok(());
        }

        let lock = {
            let tables = self.shared.tables();
            tables.row_locks.get(&id).cloned()
        }
        .ok_or_else(|| LedgerError::account_not_found(id))?;

        let guard = tokio::time::timeout(self.shared.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                LedgerError::Conflict(format!(
                    "lock wait timeout on account {} after {:?}",
                    id, self.shared.lock_timeout
                ))
            })?;

        self.held_locks.insert(id, guard);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryLedgerTx {
    async fn create_account(&mut self, params: &NewAccount) -> Result<Account, LedgerError> {
        params.validate()?;

        let id = next_id(&mut self.shared.tables().account_seq);
        let account = Account {
            id,
            owner: params.owner.clone(),
            balance: params.balance,
            currency: params.currency.as_str().to_string(),
            created_at: Utc::now(),
        };

        self.new_accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.view_account(id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    async fn lock_account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        if !self.account_exists(id) {
            return Err(LedgerError::account_not_found(id));
        }

        self.acquire_row_lock(id).await?;
        self.view_account(id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    async fn list_accounts(&mut self, page: Page) -> Result<Vec<Account>, LedgerError> {
        let ids: Vec<AccountId> = {
            let tables = self.shared.tables();
            let mut ids: Vec<AccountId> = tables.accounts.keys().copied().collect();
            ids.extend(self.new_accounts.keys().copied());
            ids
        };

        let mut rows: Vec<Account> = ids
            .into_iter()
            .filter_map(|id| self.view_account(id))
            .collect();
        rows.sort_by_key(|a| a.id);

        Ok(page.window(&rows))
    }

    async fn add_balance(&mut self, id: AccountId, delta: i64) -> Result<Account, LedgerError> {
        self.shared.check_fault(FaultPoint::AddBalance)?;

        if !self.account_exists(id) {
            return Err(LedgerError::account_not_found(id));
        }

        self.acquire_row_lock(id).await?;

        let current = self
            .view_account(id)
            .ok_or_else(|| LedgerError::account_not_found(id))?;
        if current.balance.checked_add(delta).is_none() {
            return Err(LedgerError::Database(format!(
                "balance of account {} out of range",
                id
            )));
        }

        *self.deltas.entry(id).or_insert(0) += delta;
        self.view_account(id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }
}

#[async_trait]
impl EntryStore for MemoryLedgerTx {
    async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: i64,
    ) -> Result<Entry, LedgerError> {
        self.shared.check_fault(FaultPoint::CreateEntry)?;

        if !self.account_exists(account_id) {
            return Err(LedgerError::account_not_found(account_id));
        }

        let entry = Entry {
            id: next_id(&mut self.shared.tables().entry_seq),
            account_id,
            amount,
            created_at: Utc::now(),
        };

        self.new_entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, LedgerError> {
        if let Some(entry) = self.new_entries.iter().find(|e| e.id == id) {
            return Ok(entry.clone());
        }

        self.shared
            .tables()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("entry {} does not exist", id)))
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, LedgerError> {
        let mut rows: Vec<Entry> = self
            .shared
            .tables()
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        rows.extend(
            self.new_entries
                .iter()
                .filter(|e| e.account_id == account_id)
                .cloned(),
        );
        rows.sort_by_key(|e| e.id);

        Ok(page.window(&rows))
    }
}

#[async_trait]
impl TransferStore for MemoryLedgerTx {
    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<Transfer, LedgerError> {
        self.shared.check_fault(FaultPoint::CreateTransfer)?;

        if amount <= 0 {
            return Err(LedgerError::InvalidArgument(
                "transfer amount must be positive".to_string(),
            ));
        }
        for id in [from_account_id, to_account_id] {
            if !self.account_exists(id) {
                return Err(LedgerError::account_not_found(id));
            }
        }

        let transfer = Transfer {
            id: next_id(&mut self.shared.tables().transfer_seq),
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };

        self.new_transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, LedgerError> {
        if let Some(transfer) = self.new_transfers.iter().find(|t| t.id == id) {
            return Ok(transfer.clone());
        }

        self.shared
            .tables()
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transfer {} does not exist", id)))
    }

    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let related =
            |t: &Transfer| t.from_account_id == from_account_id || t.to_account_id == to_account_id;

        let mut rows: Vec<Transfer> = self
            .shared
            .tables()
            .transfers
            .values()
            .filter(|t| related(*t))
            .cloned()
            .collect();
        rows.extend(self.new_transfers.iter().filter(|t| related(*t)).cloned());
        rows.sort_by_key(|t| t.id);

        Ok(page.window(&rows))
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.shared.check_fault(FaultPoint::Commit)?;

        let MemoryLedgerTx {
            shared,
            held_locks,
            new_accounts,
            deltas,
            new_entries,
            new_transfers,
        } = *self;

        {
            let mut tables = shared.tables();

            // Validate every balance before touching any, so a failure publishes nothing
            let mut balances = Vec::with_capacity(deltas.len());
            for (id, delta) in deltas {
                let account = new_accounts
                    .get(&id)
                    .or_else(|| tables.accounts.get(&id))
                    .ok_or_else(|| LedgerError::account_not_found(id))?;
                let balance = account.balance.checked_add(delta).ok_or_else(|| {
                    LedgerError::Database(format!("balance of account {} out of range", id))
                })?;
                balances.push((id, balance));
            }

            for (id, account) in new_accounts {
                tables.accounts.insert(id, account);
                tables
                    .row_locks
                    .insert(id, Arc::new(tokio::sync::Mutex::new(())));
            }
            for (id, balance) in balances {
                if let Some(account) = tables.accounts.get_mut(&id) {
                    account.balance = balance;
                }
            }

            for entry in new_entries {
                tables.entries.insert(entry.id, entry);
            }
            for transfer in new_transfers {
                tables.transfers.insert(transfer.id, transfer);
            }
        }

        // Row locks are released only after the writes are visible
        drop(held_locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::Currency;

    async fn seed(ledger: &MemoryLedger, balances: &[i64]) -> Vec<Account> {
        let mut tx = ledger.begin().await.unwrap();
        let mut accounts = Vec::new();
        for (i, balance) in balances.iter().enumerate() {
            let params = NewAccount::new(format!("owner-{}", i), *balance, Currency::Usd);
            accounts.push(tx.create_account(&params).await.unwrap());
        }
        tx.commit().await.unwrap();
        accounts
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let ledger = MemoryLedger::new();
        let accounts = seed(&ledger, &[100]).await;
        let id = accounts[0].id;

        let mut tx = ledger.begin().await.unwrap();
        tx.create_entry(id, 25).await.unwrap();
        let updated = tx.add_balance(id, 25).await.unwrap();
        assert_eq!(updated.balance, 125);
        tx.commit().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        assert_eq!(tx.get_account(id).await.unwrap().balance, 125);
        assert_eq!(tx.list_entries(id, Page::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let ledger = MemoryLedger::new();
        let id = seed(&ledger, &[100]).await[0].id;

        let mut writer = ledger.begin().await.unwrap();
        writer.add_balance(id, -60).await.unwrap();
        writer.create_entry(id, -60).await.unwrap();

        let mut reader = ledger.begin().await.unwrap();
        assert_eq!(reader.get_account(id).await.unwrap().balance, 100);
        assert!(reader.list_entries(id, Page::default()).await.unwrap().is_empty());

        drop(writer);
        assert_eq!(reader.get_account(id).await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_until_timeout() {
        let ledger = MemoryLedger::with_lock_timeout(Duration::from_millis(50));
        let id = seed(&ledger, &[10]).await[0].id;

        let mut holder = ledger.begin().await.unwrap();
        holder.lock_account(id).await.unwrap();

        let mut waiter = ledger.begin().await.unwrap();
        let err = waiter.add_balance(id, 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        holder.rollback().await.unwrap();
        let updated = waiter.add_balance(id, 1).await.unwrap();
        assert_eq!(updated.balance, 11);
    }

    #[tokio::test]
    async fn test_lock_sees_latest_committed_balance() {
        let ledger = MemoryLedger::new();
        let id = seed(&ledger, &[10]).await[0].id;

        let mut first = ledger.begin().await.unwrap();
        first.add_balance(id, 5).await.unwrap();

        let waiter_ledger = ledger.clone();
        let waiter = tokio::spawn(async move {
            let mut tx = waiter_ledger.begin().await.unwrap();
            let seen = tx.lock_account(id).await.unwrap();
            tx.commit().await.unwrap();
            seen.balance
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        first.commit().await.unwrap();

        assert_eq!(waiter.await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_missing_account_is_not_found() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();

        assert!(matches!(
            tx.get_account(99).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            tx.lock_account(99).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            tx.add_balance(99, 1).await,
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            tx.create_entry(99, 1).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fault_fires_once() {
        let ledger = MemoryLedger::new();
        let id = seed(&ledger, &[0]).await[0].id;
        ledger.fail_next(
            FaultPoint::CreateEntry,
            LedgerError::Unavailable("connection reset".into()),
        );

        let mut tx = ledger.begin().await.unwrap();
        assert!(matches!(
            tx.create_entry(id, 1).await,
            Err(LedgerError::Unavailable(_))
        ));
        assert!(tx.create_entry(id, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_sequence_ids_not_reused_after_rollback() {
        let ledger = MemoryLedger::new();
        let accounts = seed(&ledger, &[0, 0]).await;
        let (a, b) = (accounts[0].id, accounts[1].id);

        let mut tx = ledger.begin().await.unwrap();
        let discarded = tx.create_transfer(a, b, 5).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        let kept = tx.create_transfer(a, b, 5).await.unwrap();
        tx.commit().await.unwrap();

        assert!(kept.id > discarded.id);
        let mut tx = ledger.begin().await.unwrap();
        assert!(tx.get_transfer(discarded.id).await.is_err());
        assert_eq!(tx.get_transfer(kept.id).await.unwrap(), kept);
    }

    #[tokio::test]
    async fn test_list_transfers_matches_either_side() {
        let ledger = MemoryLedger::new();
        let accounts = seed(&ledger, &[0, 0, 0]).await;
        let (a, b, c) = (accounts[0].id, accounts[1].id, accounts[2].id);

        let mut tx = ledger.begin().await.unwrap();
        tx.create_transfer(a, b, 1).await.unwrap();
        tx.create_transfer(c, a, 2).await.unwrap();
        tx.create_transfer(b, c, 3).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin().await.unwrap();
        let rows = tx.list_transfers(a, a, Page::default()).await.unwrap();
        let amounts: Vec<i64> = rows.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![1, 2]);
    }
}
