//! Money Transfer Engine
//!
//! Moves an amount from one account to another as a single unit of work on
//! the ledger: one transfer row, a debit entry, a credit entry and two
//! balance increments, all committed together or not at all.
//!
//! # State Machine
//!
//! ```text
//! STARTED → LOCKS_ACQUIRED → ROWS_WRITTEN → BALANCES_UPDATED → COMMITTED
//!    └──────────────┴───────────────┴────────────────┴──────→ ROLLED_BACK
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Lock Ordering**: account rows are locked lowest id first, whatever the direction
//! 2. **Atomic Increment**: balances change only through the store's `add_balance`
//! 3. **All or Nothing**: any failure, deadline or cancellation rolls back the unit of work
//! 4. **No Deduplication**: every call that commits creates a new transfer

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use coordinator::LockOrder;
pub use engine::TransferEngine;
pub use error::TransferError;
pub use state::{TransferFsm, TransferState};
pub use types::{RequestContext, TransferParams, TransferResult};
