//! Coin transfers between users
//!
//! A transfer is one unit of work: both balances are locked in ascending
//! user-id order, so two opposite transfers between the same pair cannot
//! deadlock, and the debit, credit and transaction record commit together.

use crate::{
    error::{Error, Result},
    metrics::LedgerMetrics,
    storage::LedgerStore,
    types::{Transaction, UserId},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Moves coins from one user to another
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    metrics: LedgerMetrics,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>, metrics: LedgerMetrics) -> Self {
        Self { store, metrics }
    }

    /// Transfer `amount` coins from `from` to `to`.
    ///
    /// Sending to oneself is allowed; the balance is unchanged but the
    /// transaction is still recorded.
    pub async fn send_coin(&self, from: UserId, to: UserId, amount: i64) -> Result<Transaction> {
        if amount <= 0 {
            let err = Error::InvalidAmount(amount);
            warn!("Rejected transfer {} -> {}: {}", from, to, err);
            self.metrics.record_transfer_error(&err);
            return Err(err);
        }

        let start = Instant::now();
        let result = self.transfer(from, to, amount).await;
        self.metrics
            .record_unit_duration("send_coin", start.elapsed().as_secs_f64());

        match &result {
            Ok(transaction) => {
                info!(
                    transaction_id = transaction.id,
                    "Transferred {} coins from user {} to user {}", amount, from, to
                );
                self.metrics.record_transfer(amount);
            }
            Err(e) if e.is_internal() => {
                error!("Transfer {} -> {} failed: {}", from, to, e);
                self.metrics.record_transfer_error(e);
            }
            Err(e) => {
                warn!("Rejected transfer {} -> {}: {}", from, to, e);
                self.metrics.record_transfer_error(e);
            }
        }

        result
    }

    async fn transfer(&self, from: UserId, to: UserId, amount: i64) -> Result<Transaction> {
        let mut unit = self.store.begin().await?;

        let (first, second) = if from <= to { (from, to) } else { (to, from) };
        let first_balance = unit.lock_balance(first).await?;
        let second_balance = if first == second {
            first_balance
        } else {
            unit.lock_balance(second).await?
        };
        let (sender_balance, recipient_balance) = if from == first {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        if sender_balance < amount {
            unit.rollback().await?;
            return Err(Error::InsufficientFunds {
                required: amount,
                available: sender_balance,
            });
        }

        let sender_after = sender_balance - amount;
        unit.set_balance(from, sender_after).await?;

        // A self-transfer credits the balance that was just debited.
        let recipient_before = if from == to {
            sender_after
        } else {
            recipient_balance
        };
        let recipient_after = recipient_before
            .checked_add(amount)
            .ok_or(Error::InvalidAmount(amount))?;
        unit.set_balance(to, recipient_after).await?;

        let transaction = unit.append_transaction(from, to, amount).await?;
        unit.commit().await?;

        Ok(transaction)
    }
}
