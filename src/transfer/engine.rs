//! Transfer engine
//!
//! Orchestrates the full transfer protocol: ledger initiation, the security
//! gate (hard lock -> temp lock -> risk -> OTP -> PIN), balance validation,
//! the atomic commit of both balance mutations, and finalization with audit
//! and notification side effects.
//!
//! # Locking
//!
//! The sender row is loaded under an exclusive lock held until the operation
//! commits or aborts; the receiver row is locked the same way (concurrent
//! inbound credits must not lose updates). The two locks are always acquired
//! in account-number order so that opposing transfers between the same pair
//! of accounts cannot deadlock.
//!
//! # Commit discipline
//!
//! No balance is touched until every check has passed. The commit section
//! debits and credits through the held locks with no await point in between
//! and then finalizes the ledger row while the locks are still held. A
//! failure anywhere before commit leaves both balances untouched and exactly
//! one FAILED ledger row behind.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::account::cache::AccountCache;
use crate::account::store::{AccountLock, AccountStore, UserStore};
use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::config::SecurityConfig;
use crate::ledger::{EntryId, LedgerEntry, LedgerStore, TxKind, TxStatus};
use crate::notify::NotificationSink;
use crate::security::otp::{OtpError, OtpVerifier};
use crate::security::pin;
use crate::security::rate_limit::RateTracker;
use crate::security::risk::{RiskAction, RiskEvaluator};

use super::error::TransferError;
use super::types::{TransferRequest, WithdrawRequest};

pub struct TransferEngine {
    accounts: Arc<dyn AccountStore>,
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn LedgerStore>,
    rate: Arc<dyn RateTracker>,
    risk: Arc<dyn RiskEvaluator>,
    otp: Arc<dyn OtpVerifier>,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditSink>,
    cache: Arc<AccountCache>,
    policy: SecurityConfig,
}

impl TransferEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn LedgerStore>,
        rate: Arc<dyn RateTracker>,
        risk: Arc<dyn RiskEvaluator>,
        otp: Arc<dyn OtpVerifier>,
        notifier: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditSink>,
        cache: Arc<AccountCache>,
        policy: SecurityConfig,
    ) -> Self {
        Self {
            accounts,
            users,
            ledger,
            rate,
            risk,
            otp,
            notifier,
            audit,
            cache,
            policy,
        }
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Move `amount` from the actor's account to another account.
    ///
    /// The PENDING row is written before any business check so rejected
    /// attempts stay auditable; on failure the row is finalized FAILED with
    /// the error text as its note and the error is re-raised.
    pub async fn transfer(
        &self,
        req: TransferRequest,
        actor: &str,
    ) -> Result<LedgerEntry, TransferError> {
        let mut entry = self
            .ledger
            .append(LedgerEntry::pending(
                TxKind::Transfer,
                req.amount,
                "transfer initiated",
            ))
            .await?;
        entry.status = TxStatus::Processing;
        self.ledger.update(&entry).await?;

        match self.run_transfer(&req, actor, &mut entry).await {
            Ok((from_owner, to_owner)) => {
                self.cache.invalidate(from_owner);
                self.cache.invalidate(to_owner);
                self.audit.emit(AuditEvent::new(
                    actor,
                    AuditAction::Transfer,
                    entry.id,
                    TxStatus::Success,
                    entry.note.clone(),
                ));
                self.notifier
                    .notify(
                        actor,
                        &format!(
                            "Transfer successful: you sent {} to {}",
                            req.amount, req.to_account
                        ),
                    )
                    .await;
                info!(
                    entry_id = %entry.id,
                    from = %req.from_account,
                    to = %req.to_account,
                    amount = %req.amount,
                    "transfer committed"
                );
                Ok(entry)
            }
            Err(e) => {
                self.finalize_failed(&mut entry, actor, AuditAction::Transfer, &e)
                    .await;
                Err(e)
            }
        }
    }

    /// Steps 2-13 of the protocol. Returns the two owner ids on commit.
    ///
    /// Any error return happens strictly before the commit section, so the
    /// caller knows no balance has moved.
    async fn run_transfer(
        &self,
        req: &TransferRequest,
        actor: &str,
        entry: &mut LedgerEntry,
    ) -> Result<(u64, u64), TransferError> {
        // 2. Resolve the acting user
        let user = self
            .users
            .find_by_username(actor)
            .await
            .map_err(|_| TransferError::NotFound)?;

        // 3. Hard lock: persistent, cleared only by the bank
        if user.locked {
            return Err(TransferError::AccountLocked);
        }

        // 4. Temporary lock from previous PIN failures
        if self.rate.is_temporarily_locked(actor).await {
            return Err(TransferError::TooManyAttempts);
        }

        // 5. External risk verdict (bounded, policy on outage)
        self.check_risk(actor, req.amount).await?;

        // 6. High-value step-up
        if req.amount >= self.policy.high_value_threshold {
            let code = match req.otp.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => code,
                _ => return Err(TransferError::OtpRequired),
            };
            self.check_otp(actor, code).await?;
        }

        // Self-transfer is a business-rule rejection, not an arithmetic no-op.
        // Checked before locking: the same row cannot be locked twice.
        if req.from_account == req.to_account {
            return Err(TransferError::InvalidRequest(
                "sender and receiver accounts are the same".to_string(),
            ));
        }

        // 7 + 11. Exclusive row locks, acquired in account-number order
        let (mut from_row, to_row) = self.lock_pair(&req.from_account, &req.to_account).await?;
        entry.from_account = Some(from_row.account_number.clone());

        // 8. Ownership
        if from_row.owner_user_id != user.id {
            return Err(TransferError::Forbidden);
        }

        // 9. PIN, with lockout escalation on mismatch
        if !pin::verify_pin(&req.pin, &user.pin_hash) {
            self.record_pin_failure(actor).await?;
            return Err(TransferError::InvalidPin);
        }
        self.rate.reset(actor).await;

        // 10. Amount sanity
        if req.amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }

        // 11. Receiver must exist
        let mut to_row =
            to_row.ok_or_else(|| TransferError::AccountNotFound(req.to_account.clone()))?;
        entry.to_account = Some(to_row.account_number.clone());

        // 12. Balance
        if from_row.balance < req.amount {
            return Err(TransferError::InsufficientBalance {
                current: from_row.balance,
            });
        }

        // 13. Commit — critical section, both locks held, no await between
        // the two mutations.
        from_row.balance -= req.amount;
        to_row.balance += req.amount;

        entry.status = TxStatus::Success;
        entry.note = req
            .note
            .clone()
            .unwrap_or_else(|| "transfer completed".to_string());
        self.finalize_committed(entry).await;

        Ok((from_row.owner_user_id, to_row.owner_user_id))
    }

    // ========================================================================
    // Deposit / Withdrawal — one-sided transfers
    // ========================================================================

    /// Branch-operated cash-in; no PIN required.
    pub async fn deposit(
        &self,
        to_account: &str,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<LedgerEntry, TransferError> {
        let mut entry = self
            .ledger
            .append(LedgerEntry::pending(
                TxKind::Deposit,
                amount,
                "deposit initiated",
            ))
            .await?;
        entry.status = TxStatus::Processing;
        self.ledger.update(&entry).await?;

        match self.run_deposit(to_account, amount, note, &mut entry).await {
            Ok(owner) => {
                self.cache.invalidate(owner);
                self.audit.emit(AuditEvent::new(
                    to_account,
                    AuditAction::Deposit,
                    entry.id,
                    TxStatus::Success,
                    entry.note.clone(),
                ));
                self.notifier
                    .notify(to_account, &format!("Deposit received: {}", amount))
                    .await;
                debug!(entry_id = %entry.id, to = to_account, amount = %amount, "deposit committed");
                Ok(entry)
            }
            Err(e) => {
                self.finalize_failed(&mut entry, to_account, AuditAction::Deposit, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn run_deposit(
        &self,
        to_account: &str,
        amount: Decimal,
        note: Option<String>,
        entry: &mut LedgerEntry,
    ) -> Result<u64, TransferError> {
        if amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }

        let mut row = self.accounts.find_for_update(to_account).await?;
        entry.to_account = Some(row.account_number.clone());

        row.balance += amount;

        entry.status = TxStatus::Success;
        entry.note = note.unwrap_or_else(|| "cash deposit at branch".to_string());
        self.finalize_committed(entry).await;

        Ok(row.owner_user_id)
    }

    /// Cash-out: ownership + PIN gate, same lockout escalation as transfer.
    pub async fn withdraw(
        &self,
        req: WithdrawRequest,
        actor: &str,
    ) -> Result<LedgerEntry, TransferError> {
        let mut entry = self
            .ledger
            .append(LedgerEntry::pending(
                TxKind::Withdrawal,
                req.amount,
                "withdrawal initiated",
            ))
            .await?;
        entry.status = TxStatus::Processing;
        self.ledger.update(&entry).await?;

        match self.run_withdraw(&req, actor, &mut entry).await {
            Ok(owner) => {
                self.cache.invalidate(owner);
                self.audit.emit(AuditEvent::new(
                    actor,
                    AuditAction::Withdrawal,
                    entry.id,
                    TxStatus::Success,
                    entry.note.clone(),
                ));
                self.notifier
                    .notify(actor, &format!("Cash withdrawal: {}", req.amount))
                    .await;
                debug!(entry_id = %entry.id, from = %req.from_account, amount = %req.amount, "withdrawal committed");
                Ok(entry)
            }
            Err(e) => {
                self.finalize_failed(&mut entry, actor, AuditAction::Withdrawal, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn run_withdraw(
        &self,
        req: &WithdrawRequest,
        actor: &str,
        entry: &mut LedgerEntry,
    ) -> Result<u64, TransferError> {
        let user = self
            .users
            .find_by_username(actor)
            .await
            .map_err(|_| TransferError::NotFound)?;
        if user.locked {
            return Err(TransferError::AccountLocked);
        }
        if self.rate.is_temporarily_locked(actor).await {
            return Err(TransferError::TooManyAttempts);
        }
        if req.amount <= Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }

        let mut row = self.accounts.find_for_update(&req.from_account).await?;
        entry.from_account = Some(row.account_number.clone());

        if row.owner_user_id != user.id {
            return Err(TransferError::Forbidden);
        }
        if !pin::verify_pin(&req.pin, &user.pin_hash) {
            self.record_pin_failure(actor).await?;
            return Err(TransferError::InvalidPin);
        }
        self.rate.reset(actor).await;

        if row.balance < req.amount {
            return Err(TransferError::InsufficientBalance {
                current: row.balance,
            });
        }

        row.balance -= req.amount;

        entry.status = TxStatus::Success;
        entry.note = req
            .note
            .clone()
            .unwrap_or_else(|| "cash withdrawal".to_string());
        self.finalize_committed(entry).await;

        Ok(row.owner_user_id)
    }

    // ========================================================================
    // Reversal — compensating operation, never part of the protocol
    // ========================================================================

    /// Reverse a previously successful transfer.
    ///
    /// Appends a new compensating entry moving the amount back and applies
    /// the out-of-band `Success -> Reversed` transition to the original row.
    pub async fn reverse(
        &self,
        original_id: EntryId,
        actor: &str,
    ) -> Result<LedgerEntry, TransferError> {
        let original = self
            .ledger
            .get(original_id)
            .await
            .map_err(|_| TransferError::InvalidRequest("ledger entry not found".to_string()))?;

        if original.kind != TxKind::Transfer || original.status != TxStatus::Success {
            return Err(TransferError::InvalidRequest(
                "only successful transfers can be reversed".to_string(),
            ));
        }
        let (orig_from, orig_to) = match (&original.from_account, &original.to_account) {
            (Some(f), Some(t)) => (f.clone(), t.clone()),
            _ => {
                return Err(TransferError::Internal(
                    "transfer entry missing account refs".to_string(),
                ));
            }
        };

        let mut comp = self
            .ledger
            .append(LedgerEntry::pending(
                TxKind::Transfer,
                original.amount,
                "reversal initiated",
            ))
            .await?;
        comp.status = TxStatus::Processing;
        self.ledger.update(&comp).await?;

        match self
            .run_reverse(&original, &orig_from, &orig_to, &mut comp)
            .await
        {
            Ok((from_owner, to_owner)) => {
                self.cache.invalidate(from_owner);
                self.cache.invalidate(to_owner);
                self.audit.emit(AuditEvent::new(
                    actor,
                    AuditAction::Reversal,
                    comp.id,
                    TxStatus::Reversed,
                    format!("reversal of {}", original.id),
                ));
                info!(
                    entry_id = %comp.id,
                    original = %original.id,
                    amount = %original.amount,
                    "transfer reversed"
                );
                Ok(comp)
            }
            Err(e) => {
                self.finalize_failed(&mut comp, actor, AuditAction::Reversal, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn run_reverse(
        &self,
        original: &LedgerEntry,
        orig_from: &str,
        orig_to: &str,
        comp: &mut LedgerEntry,
    ) -> Result<(u64, u64), TransferError> {
        // The compensating movement runs in the opposite direction.
        let (mut from_row, to_row) = self.lock_pair(orig_to, orig_from).await?;
        let mut to_row = to_row.ok_or_else(|| TransferError::AccountNotFound(orig_from.to_string()))?;
        comp.from_account = Some(from_row.account_number.clone());
        comp.to_account = Some(to_row.account_number.clone());

        // Re-read under the row locks: a concurrent reversal of the same
        // entry may have won the race since the unlocked status check.
        let current = self.ledger.get(original.id).await?;
        if current.status != TxStatus::Success {
            return Err(TransferError::InvalidRequest(
                "entry has already been reversed".to_string(),
            ));
        }

        // The receiver may have spent the funds already
        if from_row.balance < original.amount {
            return Err(TransferError::InsufficientBalance {
                current: from_row.balance,
            });
        }

        // Mark the original REVERSED before any balance moves. Both locks
        // are still held, so no other reversal can interleave; a rejected
        // transition aborts with balances untouched.
        let mut reversed = current;
        reversed.status = TxStatus::Reversed;
        reversed.note = format!("reversed by {}", comp.id);
        self.ledger.update(&reversed).await?;

        from_row.balance -= original.amount;
        to_row.balance += original.amount;

        comp.status = TxStatus::Success;
        comp.note = format!("reversal of {}", original.id);
        self.finalize_committed(comp).await;

        Ok((from_row.owner_user_id, to_row.owner_user_id))
    }

    // ========================================================================
    // Gate helpers
    // ========================================================================

    /// Acquire both row locks in account-number order (ABBA deadlock
    /// avoidance). The sender must exist; a missing receiver is reported by
    /// the caller at its place in the protocol.
    async fn lock_pair(
        &self,
        from: &str,
        to: &str,
    ) -> Result<(AccountLock, Option<AccountLock>), TransferError> {
        if from < to {
            let from_row = self
                .accounts
                .find_for_update(from)
                .await
                .map_err(|_| TransferError::AccountNotFound(from.to_string()))?;
            let to_row = self.accounts.find_for_update(to).await.ok();
            Ok((from_row, to_row))
        } else {
            let to_row = self.accounts.find_for_update(to).await.ok();
            let from_row = self
                .accounts
                .find_for_update(from)
                .await
                .map_err(|_| TransferError::AccountNotFound(from.to_string()))?;
            Ok((from_row, to_row))
        }
    }

    async fn check_risk(&self, identity: &str, amount: Decimal) -> Result<(), TransferError> {
        let timeout = Duration::from_millis(self.policy.risk_timeout_ms);
        match tokio::time::timeout(timeout, self.risk.evaluate(identity, amount)).await {
            Ok(Ok(verdict)) => {
                if verdict.action == RiskAction::Block {
                    warn!(
                        identity,
                        level = %verdict.risk_level,
                        amount = %amount,
                        "risk engine blocked transfer"
                    );
                    return Err(TransferError::RiskBlocked);
                }
                Ok(())
            }
            Ok(Err(e)) => self.risk_outage(identity, &e.to_string()),
            Err(_) => self.risk_outage(identity, "risk evaluation timed out"),
        }
    }

    /// Deliberate business-risk tradeoff, resolved by configuration and
    /// logged loudly either way.
    fn risk_outage(&self, identity: &str, reason: &str) -> Result<(), TransferError> {
        if self.policy.risk_fail_open {
            error!(identity, reason, "risk engine unavailable, failing OPEN");
            Ok(())
        } else {
            error!(identity, reason, "risk engine unavailable, failing CLOSED");
            Err(TransferError::RiskBlocked)
        }
    }

    async fn check_otp(&self, identity: &str, code: &str) -> Result<(), TransferError> {
        let timeout = Duration::from_millis(self.policy.otp_timeout_ms);
        match tokio::time::timeout(timeout, self.otp.validate(identity, code)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(OtpError::Expired)) => Err(TransferError::OtpExpired),
            Ok(Err(OtpError::Mismatch)) => Err(TransferError::InvalidOtp),
            // Security-critical gate: a verifier timeout never fails open.
            Err(_) => Err(TransferError::Internal(
                "OTP verification timed out".to_string(),
            )),
        }
    }

    /// Lockout escalation: temp lock at exactly `temp_lock_threshold`
    /// failures, persistent lock at `hard_lock_threshold` or more (which
    /// also clears the ephemeral counter).
    async fn record_pin_failure(&self, identity: &str) -> Result<(), TransferError> {
        let count = self.rate.record_failure(identity).await;

        if count == self.policy.temp_lock_threshold {
            self.rate.lock_temporarily(identity).await;
            warn!(identity, count, "temporary PIN lock engaged");
        }

        if count >= self.policy.hard_lock_threshold {
            self.users
                .set_locked(identity, true)
                .await
                .map_err(|e| TransferError::Internal(e.to_string()))?;
            self.rate.reset(identity).await;
            warn!(identity, count, "persistent account lock engaged");
        }

        Ok(())
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Persist the SUCCESS transition. Balances are already moved; if the
    /// store rejects the write the row stays PROCESSING and is picked up by
    /// reconciliation, never rolled back here.
    async fn finalize_committed(&self, entry: &LedgerEntry) {
        if let Err(e) = self.ledger.update(entry).await {
            error!(entry_id = %entry.id, error = %e, "ledger finalize failed; row left in PROCESSING");
        }
    }

    async fn finalize_failed(
        &self,
        entry: &mut LedgerEntry,
        actor: &str,
        action: AuditAction,
        err: &TransferError,
    ) {
        entry.status = TxStatus::Failed;
        entry.note = format!("failure: {}", err);
        if let Err(e) = self.ledger.update(entry).await {
            error!(entry_id = %entry.id, error = %e, "failed to finalize FAILED ledger row");
        }
        self.audit.emit(AuditEvent::new(
            actor,
            action,
            entry.id,
            TxStatus::Failed,
            entry.note.clone(),
        ));
        warn!(entry_id = %entry.id, code = err.code(), "{} failed: {}", action, err);
    }
}
