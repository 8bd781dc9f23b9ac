//! Scheduled interest accrual
//!
//! Periodic sweep crediting interest on positive balances of active
//! accounts. Each credit is a normal DEPOSIT ledger entry, so accrued
//! interest shows up on statements like any other movement.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::account::cache::AccountCache;
use crate::account::store::AccountStore;
use crate::ledger::{LedgerEntry, LedgerStore, TxKind, TxStatus};

pub struct InterestWorker {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    cache: Arc<AccountCache>,
    /// Per-sweep rate, e.g. 0.005 for 0.5%.
    rate: Decimal,
    interval: Duration,
}

impl InterestWorker {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerStore>,
        cache: Arc<AccountCache>,
        rate: Decimal,
        interval: Duration,
    ) -> Self {
        Self {
            accounts,
            ledger,
            cache,
            rate,
            interval,
        }
    }

    /// One full sweep over every account. Returns how many were credited.
    pub async fn accrue_once(&self) -> usize {
        let numbers = self.accounts.list_account_numbers().await;
        let mut credited = 0;

        for number in numbers {
            let mut row = match self.accounts.find_for_update(&number).await {
                Ok(row) => row,
                // Closed between snapshot and lock; skip
                Err(_) => continue,
            };
            if !row.status.can_transact() || row.balance <= Decimal::ZERO {
                continue;
            }

            let interest = (row.balance * self.rate).round_dp(2);
            if interest <= Decimal::ZERO {
                continue;
            }

            let mut entry = match self
                .ledger
                .append(LedgerEntry::pending(
                    TxKind::Deposit,
                    interest,
                    "interest accrual",
                ))
                .await
            {
                Ok(entry) => entry,
                Err(e) => {
                    error!(account = %number, error = %e, "interest ledger append failed");
                    continue;
                }
            };
            entry.to_account = Some(row.account_number.clone());
            entry.status = TxStatus::Processing;
            if let Err(e) = self.ledger.update(&entry).await {
                error!(entry_id = %entry.id, error = %e, "interest ledger update failed");
                continue;
            }

            // Credit while the row lock is held, then finalize
            row.balance += interest;
            entry.status = TxStatus::Success;
            if let Err(e) = self.ledger.update(&entry).await {
                error!(entry_id = %entry.id, error = %e, "interest finalize failed; row left in PROCESSING");
            }
            self.cache.invalidate(row.owner_user_id);

            debug!(account = %number, amount = %interest, "interest credited");
            credited += 1;
        }

        info!(credited, rate = %self.rate, "interest sweep complete");
        credited
    }

    /// Run sweeps forever on the configured interval.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // First tick fires immediately; skip it so accrual starts one full
        // interval after boot.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.accrue_once().await;
        }
    }
}
