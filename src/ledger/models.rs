//! Ledger row types
//!
//! Rows map 1:1 onto the `accounts`, `entries` and `transfers` tables.
//! Amounts are integers in minor units (cents).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

pub type AccountId = i64;
pub type EntryId = i64;
pub type TransferId = i64;

/// Largest page a list query may request
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Account row. `balance` is only ever changed through `add_balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// One side of a transfer's effect on one account.
///
/// Negative for the debited account, positive for the credited one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Settled movement of `amount` from one account to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Supported account currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Cad,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Cad => "CAD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "CAD" => Ok(Currency::Cad),
            _ => Err(LedgerError::InvalidArgument(format!(
                "unsupported currency: {}",
                s
            ))),
        }
    }
}

/// Parameters for opening an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub balance: i64,
    pub currency: Currency,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, balance: i64, currency: Currency) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.owner.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "owner must not be empty".to_string(),
            ));
        }
        if self.balance < 0 {
            return Err(LedgerError::InvalidArgument(
                "opening balance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// LIMIT/OFFSET window for list queries. Only built through [`Page::new`],
/// so `limit` is in `1..=MAX_PAGE_LIMIT` and `offset` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPage")]
pub struct Page {
    limit: i64,
    offset: i64,
}

#[derive(Deserialize)]
struct RawPage {
    limit: i64,
    offset: i64,
}

impl TryFrom<RawPage> for Page {
    type Error = LedgerError;

    fn try_from(raw: RawPage) -> Result<Self, Self::Error> {
        Page::new(raw.limit, raw.offset)
    }
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Result<Self, LedgerError> {
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(LedgerError::InvalidArgument(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        if offset < 0 {
            return Err(LedgerError::InvalidArgument(
                "offset must not be negative".to_string(),
            ));
        }
        Ok(Self { limit, offset })
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn window<T: Clone>(&self, rows: &[T]) -> Vec<T> {
        rows.iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}
