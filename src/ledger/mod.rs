//! Ledger Store
//!
//! Durable storage for accounts, entries and transfers.
//!
//! # Tables
//!
//! ```text
//! accounts  (id, owner, balance, currency, created_at)   balance updated in place
//! entries   (id, account_id, amount, created_at)          append-only
//! transfers (id, from_account_id, to_account_id, amount, created_at)  append-only
//! ```
//!
//! # Backends
//!
//! - [`PgLedger`] - PostgreSQL via `sqlx`
//! - [`MemoryLedger`] - in-process store with the same locking contract

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod service;
pub mod store;

pub use error::LedgerError;
pub use memory::{FaultPoint, MemoryLedger};
pub use models::{
    Account, AccountId, Currency, Entry, EntryId, NewAccount, Page, Transfer, TransferId,
};
pub use postgres::PgLedger;
pub use service::LedgerService;
pub use store::{AccountStore, EntryStore, Ledger, LedgerTx, TransferStore};
