//! Transfer Engine
//!
//! Moves money between two accounts as one unit of work:
//!
//! 1. lock both account rows, lowest id first
//! 2. check the source can cover the amount (unless overdraft is allowed)
//! 3. insert the transfer row, a debit entry and a credit entry
//! 4. apply both balance deltas with the store's atomic increment
//! 5. commit
//!
//! Any failure rolls the whole unit back. The engine never retries; calling
//! it twice with the same arguments makes two transfers.

use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, info_span, warn};

use super::coordinator::LockOrder;
use super::error::TransferError;
use super::state::{TransferFsm, TransferState};
use super::types::{RequestContext, TransferParams, TransferResult};
use crate::config::TransferConfig;
use crate::ledger::{EntryStore, Ledger, LedgerTx, TransferStore};

pub struct TransferEngine {
    ledger: Arc<dyn Ledger>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self::with_config(ledger, TransferConfig::default())
    }

    pub fn with_config(ledger: Arc<dyn Ledger>, config: TransferConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Execute one transfer.
    ///
    /// The deadline comes from `ctx`, falling back to the configured default.
    /// It bounds everything up to the commit: when it elapses the in-flight
    /// unit of work is dropped (rolled back, locks released) and
    /// `DeadlineExceeded` is returned. Once the commit has been sent it runs
    /// to completion, so a deadline never masks a durable transfer.
    pub async fn transfer_money(
        &self,
        params: TransferParams,
        ctx: &RequestContext,
    ) -> Result<TransferResult, TransferError> {
        let span = info_span!(
            "transfer",
            correlation_id = %ctx.correlation_id,
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount,
        );

        let deadline = ctx.deadline.or_else(|| self.config.default_deadline());

        async move {
            if let Err(e) = params.validate() {
                warn!(code = e.code(), error = %e, "Transfer rejected");
                return Err(e);
            }

            self.execute(params, deadline).await
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        params: TransferParams,
        deadline: Option<Duration>,
    ) -> Result<TransferResult, TransferError> {
        let mut fsm = TransferFsm::new();

        let staged = match deadline {
            Some(limit) => match tokio::time::timeout(limit, self.stage(&mut fsm, params)).await {
                Ok(staged) => staged,
                Err(_) => {
                    return Err(rolled_back(
                        &mut fsm,
                        TransferError::DeadlineExceeded(limit),
                    ));
                }
            },
            None => self.stage(&mut fsm, params).await,
        };
        let (tx, result) = staged?;

        if let Err(e) = tx.commit().await {
            return Err(rolled_back(&mut fsm, e.into()));
        }
        fsm.advance(TransferState::Committed)?;

        info!(
            transfer_id = result.transfer.id,
            from_balance = result.from_account.balance,
            to_balance = result.to_account.balance,
            "Transfer committed"
        );
        Ok(result)
    }

    /// Begin a unit of work and apply every write, leaving it ready to commit.
    /// On failure the unit of work is rolled back.
    async fn stage(
        &self,
        fsm: &mut TransferFsm,
        params: TransferParams,
    ) -> Result<(Box<dyn LedgerTx>, TransferResult), TransferError> {
        let mut tx = match self.ledger.begin().await {
            Ok(tx) => tx,
            Err(e) => return Err(rolled_back(fsm, e.into())),
        };

        match self.run(&mut *tx, fsm, params).await {
            Ok(result) => Ok((tx, result)),
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "Rollback failed");
                }
                Err(rolled_back(fsm, e))
            }
        }
    }

    async fn run(
        &self,
        tx: &mut dyn LedgerTx,
        fsm: &mut TransferFsm,
        params: TransferParams,
    ) -> Result<TransferResult, TransferError> {
        let TransferParams {
            from_account_id,
            to_account_id,
            amount,
        } = params;
        let order = LockOrder::new(from_account_id, to_account_id);

        let (source, _) = order.acquire(&mut *tx).await?;
        fsm.advance(TransferState::LocksAcquired)?;

        if !self.config.allow_overdraft && source.balance < amount {
            return Err(TransferError::InsufficientFunds {
                account_id: source.id,
                balance: source.balance,
                required: amount,
            });
        }

        let transfer = tx
            .create_transfer(from_account_id, to_account_id, amount)
            .await?;
        let from_entry = tx.create_entry(from_account_id, -amount).await?;
        let to_entry = tx.create_entry(to_account_id, amount).await?;
        fsm.advance(TransferState::RowsWritten)?;

        let (from_account, to_account) = order.add_balances(&mut *tx, amount).await?;
        fsm.advance(TransferState::BalancesUpdated)?;

        Ok(TransferResult {
            transfer,
            from_entry,
            to_entry,
            from_account,
            to_account,
        })
    }
}

fn rolled_back(fsm: &mut TransferFsm, err: TransferError) -> TransferError {
    let failed_in = fsm.abort();
    warn!(
        state = %failed_in,
        code = err.code(),
        error = %err,
        "Transfer rolled back"
    );
    err
}
