//! Transfer FSM State Definitions
//!
//! ```text
//! STARTED → LOCKS_ACQUIRED → ROWS_WRITTEN → BALANCES_UPDATED → COMMITTED
//!    └──────────────┴───────────────┴────────────────┴──────→ ROLLED_BACK
//! ```
//!
//! The FSM lives for a single `transfer_money` call and is never persisted;
//! callers only ever observe the terminal outcome.

use std::fmt;
use tracing::debug;

use super::error::TransferError;

/// Transfer FSM States
///
/// Terminal states: COMMITTED (40), ROLLED_BACK (-10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransferState {
    /// Unit of work opened
    Started = 0,

    /// Both account rows locked, lowest id first
    LocksAcquired = 10,

    /// Transfer row and both entries inserted
    RowsWritten = 20,

    /// Both balances incremented
    BalancesUpdated = 30,

    /// Terminal: unit of work committed
    Committed = 40,

    /// Terminal: unit of work aborted, nothing visible
    RolledBack = -10,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::RolledBack)
    }

    /// Get the numeric state ID
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Forward successor on the happy path
    pub fn next(&self) -> Option<TransferState> {
        match self {
            TransferState::Started => Some(TransferState::LocksAcquired),
            TransferState::LocksAcquired => Some(TransferState::RowsWritten),
            TransferState::RowsWritten => Some(TransferState::BalancesUpdated),
            TransferState::BalancesUpdated => Some(TransferState::Committed),
            TransferState::Committed | TransferState::RolledBack => None,
        }
    }

    /// Legal transitions: one step forward, or to ROLLED_BACK from any non-terminal state
    pub fn can_transition_to(&self, target: TransferState) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == TransferState::RolledBack || self.next() == Some(target)
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Started => "STARTED",
            TransferState::LocksAcquired => "LOCKS_ACQUIRED",
            TransferState::RowsWritten => "ROWS_WRITTEN",
            TransferState::BalancesUpdated => "BALANCES_UPDATED",
            TransferState::Committed => "COMMITTED",
            TransferState::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-transfer state tracker
#[derive(Debug)]
pub struct TransferFsm {
    state: TransferState,
}

impl TransferFsm {
    pub fn new() -> Self {
        Self {
            state: TransferState::Started,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn advance(&mut self, target: TransferState) -> Result<(), TransferError> {
        if !self.state.can_transition_to(target) {
            return Err(TransferError::InvalidStateTransition(format!(
                "{} -> {}",
                self.state, target
            )));
        }

        debug!(from = %self.state, to = %target, "Transfer state transition");
        self.state = target;
        Ok(())
    }

    /// Move to ROLLED_BACK. Returns the state the failure happened in.
    pub fn abort(&mut self) -> TransferState {
        let failed_in = self.state;
        if !self.state.is_terminal() {
            debug!(from = %self.state, "Transfer state transition to ROLLED_BACK");
            self.state = TransferState::RolledBack;
        }
        failed_in
    }
}

impl Default for TransferFsm {
    fn default() -> Self {
        Self::new()
    }
}
