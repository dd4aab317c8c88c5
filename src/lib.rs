//! ledger-bank - Ledger-backed accounts and money transfers
//!
//! Balances live on account rows; every movement is recorded as one
//! transfer row plus a debit and a credit entry, written in a single unit
//! of work.
//!
//! # Modules
//!
//! - [`ledger`] - Account/entry/transfer store traits, PostgreSQL and in-memory backends
//! - [`transfer`] - Transfer engine: lock ordering, FSM, deadlines
//! - [`db`] - Connection pool and bootstrap schema
//! - [`config`] - YAML application config
//! - [`logging`] - `tracing` subscriber setup

pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use ledger::{
    Account, AccountId, Currency, Entry, Ledger, LedgerError, LedgerService, MemoryLedger,
    NewAccount, Page, PgLedger, Transfer,
};
pub use transfer::{RequestContext, TransferEngine, TransferError, TransferParams, TransferResult};
