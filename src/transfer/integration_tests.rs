//! End-to-end engine tests over the in-memory stores

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::account::cache::AccountCache;
use crate::account::models::{Account, AccountType, User};
use crate::account::store::{AccountStore, InMemoryAccountStore, InMemoryUserStore, UserStore};
use crate::audit::{AuditAction, MemoryAuditSink};
use crate::config::SecurityConfig;
use crate::ledger::{
    EntryId, InMemoryLedgerStore, LedgerEntry, LedgerError, LedgerStore, Page, TxKind, TxStatus,
};
use crate::notify::MemoryNotifier;
use crate::security::otp::{InMemoryOtpVerifier, OtpError, OtpVerifier};
use crate::security::rate_limit::InMemoryRateTracker;
use crate::security::risk::{
    RiskAction, RiskError, RiskEvaluator, RiskVerdict, StaticRiskEvaluator,
};

use super::engine::TransferEngine;
use super::error::TransferError;
use super::types::{TransferRequest, WithdrawRequest};

const ALICE_ACC: &str = "001202600015";
const BOB_ACC: &str = "001202600023";

struct Bank {
    engine: Arc<TransferEngine>,
    accounts: Arc<InMemoryAccountStore>,
    users: Arc<InMemoryUserStore>,
    ledger: Arc<dyn LedgerStore>,
    otp: Arc<dyn OtpVerifier>,
    audit: Arc<MemoryAuditSink>,
}

impl Bank {
    async fn balance(&self, number: &str) -> Decimal {
        self.accounts.find(number).await.unwrap().balance
    }
}

/// Risk evaluator that is always down.
struct FailingRiskEvaluator;

#[async_trait]
impl RiskEvaluator for FailingRiskEvaluator {
    async fn evaluate(&self, _identity: &str, _amount: Decimal) -> Result<RiskVerdict, RiskError> {
        Err(RiskError::Unavailable("connection refused".to_string()))
    }
}

/// Risk evaluator that never answers; only the engine timeout ends the call.
struct HangingRiskEvaluator;

#[async_trait]
impl RiskEvaluator for HangingRiskEvaluator {
    async fn evaluate(&self, _identity: &str, _amount: Decimal) -> Result<RiskVerdict, RiskError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(RiskVerdict {
            risk_level: "LOW".to_string(),
            action: RiskAction::Allow,
        })
    }
}

/// OTP verifier that never answers.
struct HangingOtpVerifier;

#[async_trait]
impl OtpVerifier for HangingOtpVerifier {
    async fn issue(&self, _identity: &str) -> String {
        "000000".to_string()
    }

    async fn validate(&self, _identity: &str, _code: &str) -> Result<(), OtpError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

/// Ledger wrapper that delays the REVERSED write, widening the window
/// between a reversal's status check and its marking.
struct SlowReversalLedger {
    inner: InMemoryLedgerStore,
}

#[async_trait]
impl LedgerStore for SlowReversalLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry, LedgerError> {
        self.inner.append(entry).await
    }

    async fn update(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if entry.status == TxStatus::Reversed {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        self.inner.update(entry).await
    }

    async fn get(&self, id: EntryId) -> Result<LedgerEntry, LedgerError> {
        self.inner.get(id).await
    }

    async fn page_by_account(
        &self,
        account_number: &str,
        page: usize,
        page_size: usize,
    ) -> Page<LedgerEntry> {
        self.inner.page_by_account(account_number, page, page_size).await
    }

    async fn stale_processing(&self, older_than: chrono::Duration) -> Vec<LedgerEntry> {
        self.inner.stale_processing(older_than).await
    }
}

struct BankConfig {
    risk: Arc<dyn RiskEvaluator>,
    otp: Arc<dyn OtpVerifier>,
    ledger: Arc<dyn LedgerStore>,
    policy: SecurityConfig,
    attempt_window: Duration,
    temp_lock_ttl: Duration,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            risk: Arc::new(StaticRiskEvaluator::allow()),
            otp: Arc::new(InMemoryOtpVerifier::new(Duration::from_secs(300))),
            ledger: Arc::new(InMemoryLedgerStore::new()),
            policy: SecurityConfig::default(),
            attempt_window: Duration::from_secs(3600),
            temp_lock_ttl: Duration::from_secs(300),
        }
    }
}

async fn build_bank(cfg: BankConfig) -> Bank {
    let accounts = Arc::new(InMemoryAccountStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let ledger = cfg.ledger;
    let otp = cfg.otp;
    let audit = Arc::new(MemoryAuditSink::new());
    let rate = Arc::new(InMemoryRateTracker::new(
        cfg.attempt_window,
        cfg.temp_lock_ttl,
    ));
    let cache = Arc::new(AccountCache::new(
        accounts.clone() as Arc<dyn AccountStore>,
        300,
    ));

    let alice = users
        .insert(User::new(
            "alice".to_string(),
            crate::security::pin::hash_pin("1234").unwrap(),
        ))
        .await
        .unwrap();
    let bob = users
        .insert(User::new(
            "bob".to_string(),
            crate::security::pin::hash_pin("9999").unwrap(),
        ))
        .await
        .unwrap();
    accounts
        .insert(Account::new(
            ALICE_ACC.to_string(),
            AccountType::Checking,
            alice.id,
            Decimal::from(1000),
        ))
        .await
        .unwrap();
    accounts
        .insert(Account::new(
            BOB_ACC.to_string(),
            AccountType::Savings,
            bob.id,
            Decimal::from(500),
        ))
        .await
        .unwrap();

    let engine = Arc::new(TransferEngine::new(
        accounts.clone(),
        users.clone(),
        ledger.clone(),
        rate,
        cfg.risk,
        otp.clone(),
        Arc::new(MemoryNotifier::new()),
        audit.clone(),
        cache,
        cfg.policy,
    ));

    Bank {
        engine,
        accounts,
        users,
        ledger,
        otp,
        audit,
    }
}

async fn bank() -> Bank {
    build_bank(BankConfig::default()).await
}

#[tokio::test]
async fn test_transfer_moves_money_and_conserves_total() {
    let bank = bank().await;
    let entry = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(300), "1234"),
            "alice",
        )
        .await
        .unwrap();

    assert_eq!(entry.status, TxStatus::Success);
    assert_eq!(entry.from_account.as_deref(), Some(ALICE_ACC));
    assert_eq!(entry.to_account.as_deref(), Some(BOB_ACC));

    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(700));
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(800));

    let events = bank.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::Transfer);
    assert_eq!(events[0].outcome, TxStatus::Success);
}

#[tokio::test]
async fn test_wrong_pin_fails_without_moving_money() {
    let bank = bank().await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(300), "0000"),
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::InvalidPin);

    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(500));

    // Exactly one FAILED row, visible on the sender's statement
    let page = bank.ledger.page_by_account(ALICE_ACC, 0, 10).await;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].status, TxStatus::Failed);
    assert!(page.items[0].note.contains("incorrect PIN"));
}

#[tokio::test]
async fn test_insufficient_balance_reports_current() {
    let bank = bank().await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(5000), "1234"),
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransferError::InsufficientBalance {
            current: Decimal::from(1000)
        }
    );
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
}

#[tokio::test]
async fn test_self_transfer_rejected() {
    let bank = bank().await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, ALICE_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::InvalidRequest(_)));
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
}

#[tokio::test]
async fn test_unknown_receiver() {
    let bank = bank().await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, "001202699996", Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransferError::AccountNotFound("001202699996".to_string())
    );
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
}

#[tokio::test]
async fn test_non_positive_amount_rejected() {
    let bank = bank().await;
    for amount in [Decimal::ZERO, Decimal::from(-5)] {
        let err = bank
            .engine
            .transfer(
                TransferRequest::new(ALICE_ACC, BOB_ACC, amount, "1234"),
                "alice",
            )
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::InvalidAmount);
    }
}

#[tokio::test]
async fn test_sending_from_someone_elses_account_is_forbidden() {
    let bank = bank().await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(BOB_ACC, ALICE_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::Forbidden);
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(500));
}

#[tokio::test]
async fn test_lockout_escalation_temp_then_hard() {
    let bank = build_bank(BankConfig {
        temp_lock_ttl: Duration::from_millis(50),
        ..BankConfig::default()
    })
    .await;
    let bad = || TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "0000");
    let good = || TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "1234");

    // Five failures engage the temporary lock
    for _ in 0..5 {
        let err = bank.engine.transfer(bad(), "alice").await.unwrap_err();
        assert_eq!(err, TransferError::InvalidPin);
    }
    // Even the right PIN is refused while the temp lock holds
    let err = bank.engine.transfer(good(), "alice").await.unwrap_err();
    assert_eq!(err, TransferError::TooManyAttempts);

    // The temp lock lapses, the counter does not
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        bank.engine.transfer(bad(), "alice").await.unwrap_err(),
        TransferError::InvalidPin
    );
    assert_eq!(
        bank.engine.transfer(bad(), "alice").await.unwrap_err(),
        TransferError::InvalidPin
    );

    // Seventh failure flipped the persistent lock
    assert!(bank.users.find_by_username("alice").await.unwrap().locked);
    let err = bank.engine.transfer(good(), "alice").await.unwrap_err();
    assert_eq!(err, TransferError::AccountLocked);
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
}

#[tokio::test]
async fn test_successful_pin_resets_failure_counter() {
    let bank = bank().await;
    let bad = || TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "0000");
    let good = || TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "1234");

    for _ in 0..4 {
        bank.engine.transfer(bad(), "alice").await.unwrap_err();
    }
    bank.engine.transfer(good(), "alice").await.unwrap();

    // Counter restarted: four more failures still stay below the threshold
    for _ in 0..4 {
        let err = bank.engine.transfer(bad(), "alice").await.unwrap_err();
        assert_eq!(err, TransferError::InvalidPin);
    }
    bank.engine.transfer(good(), "alice").await.unwrap();
}

#[tokio::test]
async fn test_high_value_transfer_requires_otp() {
    let bank = bank().await;
    bank.engine
        .deposit(ALICE_ACC, Decimal::from(400_000), None)
        .await
        .unwrap();

    let req = TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(150_000), "1234");
    assert_eq!(
        bank.engine.transfer(req.clone(), "alice").await.unwrap_err(),
        TransferError::OtpRequired
    );

    let code = bank.otp.issue("alice").await;
    bank.engine
        .transfer(req.clone().with_otp(&code), "alice")
        .await
        .unwrap();
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(150_500));

    // The code was consumed; a replay reads as expired
    assert_eq!(
        bank.engine
            .transfer(req.with_otp(&code), "alice")
            .await
            .unwrap_err(),
        TransferError::OtpExpired
    );
}

#[tokio::test]
async fn test_otp_boundary_is_inclusive() {
    let bank = bank().await;
    bank.engine
        .deposit(ALICE_ACC, Decimal::from(400_000), None)
        .await
        .unwrap();

    // Exactly at the threshold: step-up applies
    let at = TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(100_000), "1234");
    assert_eq!(
        bank.engine.transfer(at, "alice").await.unwrap_err(),
        TransferError::OtpRequired
    );

    // One below: no OTP needed
    let below = TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(99_999), "1234");
    bank.engine.transfer(below, "alice").await.unwrap();
}

#[tokio::test]
async fn test_risk_block() {
    let bank = build_bank(BankConfig {
        risk: Arc::new(StaticRiskEvaluator::block()),
        ..BankConfig::default()
    })
    .await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::RiskBlocked);
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
}

#[tokio::test]
async fn test_risk_outage_fail_open() {
    let bank = build_bank(BankConfig {
        risk: Arc::new(FailingRiskEvaluator),
        // risk_fail_open defaults to true
        ..BankConfig::default()
    })
    .await;
    bank.engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(510));
}

#[tokio::test]
async fn test_risk_outage_fail_closed() {
    let bank = build_bank(BankConfig {
        risk: Arc::new(FailingRiskEvaluator),
        policy: SecurityConfig {
            risk_fail_open: false,
            ..SecurityConfig::default()
        },
        ..BankConfig::default()
    })
    .await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::RiskBlocked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_drain_exactly() {
    let bank = bank().await;
    let mut tasks = Vec::new();
    for _ in 0..10 {
        let engine = bank.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .transfer(
                    TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(100), "1234"),
                    "alice",
                )
                .await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::ZERO);
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(1500));

    let page = bank.ledger.page_by_account(ALICE_ACC, 0, 50).await;
    assert_eq!(page.total, 10);
    assert!(page.items.iter().all(|e| e.status == TxStatus::Success));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_do_not_deadlock() {
    let bank = bank().await;
    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = bank.engine.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                engine
                    .transfer(
                        TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(5), "1234"),
                        "alice",
                    )
                    .await
            } else {
                engine
                    .transfer(
                        TransferRequest::new(BOB_ACC, ALICE_ACC, Decimal::from(5), "9999"),
                        "bob",
                    )
                    .await
            }
        }));
    }

    let joined = tokio::time::timeout(Duration::from_secs(10), async {
        for t in tasks {
            t.await.unwrap().unwrap();
        }
    })
    .await;
    assert!(joined.is_ok(), "opposing transfers deadlocked");

    // Equal counts in both directions: balances end where they started
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(500));
}

#[tokio::test]
async fn test_reversal_returns_funds_and_marks_original() {
    let bank = bank().await;
    let original = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(300), "1234"),
            "alice",
        )
        .await
        .unwrap();

    let comp = bank.engine.reverse(original.id, "ops").await.unwrap();
    assert_eq!(comp.status, TxStatus::Success);
    assert_eq!(comp.from_account.as_deref(), Some(BOB_ACC));
    assert_eq!(comp.to_account.as_deref(), Some(ALICE_ACC));
    assert!(comp.note.contains(&original.id.to_string()));

    assert_eq!(
        bank.ledger.get(original.id).await.unwrap().status,
        TxStatus::Reversed
    );
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(500));

    // A second reversal of the same entry is refused
    assert!(matches!(
        bank.engine.reverse(original.id, "ops").await.unwrap_err(),
        TransferError::InvalidRequest(_)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reversals_apply_once() {
    // The slow REVERSED write keeps both reversals past the unlocked status
    // check; only the under-lock re-check may separate them.
    let bank = build_bank(BankConfig {
        ledger: Arc::new(SlowReversalLedger {
            inner: InMemoryLedgerStore::new(),
        }),
        ..BankConfig::default()
    })
    .await;
    let original = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(300), "1234"),
            "alice",
        )
        .await
        .unwrap();

    let first = tokio::spawn({
        let engine = bank.engine.clone();
        let id = original.id;
        async move { engine.reverse(id, "ops").await }
    });
    let second = tokio::spawn({
        let engine = bank.engine.clone();
        let id = original.id;
        async move { engine.reverse(id, "ops").await }
    });
    let outcomes = [first.await.unwrap(), second.await.unwrap()];

    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "reversal must apply exactly once");
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(TransferError::InvalidRequest(_))
    )));

    // Funds moved back exactly once
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(500));
    assert_eq!(
        bank.ledger.get(original.id).await.unwrap().status,
        TxStatus::Reversed
    );
}

#[tokio::test]
async fn test_risk_timeout_follows_fail_open() {
    let bank = build_bank(BankConfig {
        risk: Arc::new(HangingRiskEvaluator),
        policy: SecurityConfig {
            risk_timeout_ms: 50,
            ..SecurityConfig::default() // risk_fail_open: true
        },
        ..BankConfig::default()
    })
    .await;
    bank.engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(510));
}

#[tokio::test]
async fn test_risk_timeout_follows_fail_closed() {
    let bank = build_bank(BankConfig {
        risk: Arc::new(HangingRiskEvaluator),
        policy: SecurityConfig {
            risk_timeout_ms: 50,
            risk_fail_open: false,
            ..SecurityConfig::default()
        },
        ..BankConfig::default()
    })
    .await;
    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(err, TransferError::RiskBlocked);
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(1000));
}

#[tokio::test]
async fn test_otp_timeout_never_fails_open() {
    let bank = build_bank(BankConfig {
        otp: Arc::new(HangingOtpVerifier),
        policy: SecurityConfig {
            otp_timeout_ms: 50,
            ..SecurityConfig::default()
        },
        ..BankConfig::default()
    })
    .await;
    bank.engine
        .deposit(ALICE_ACC, Decimal::from(400_000), None)
        .await
        .unwrap();

    let err = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(150_000), "1234")
                .with_otp("000000"),
            "alice",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Internal(_)));
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(401_000));
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(500));
}

#[tokio::test]
async fn test_reversal_blocked_when_receiver_spent_the_funds() {
    let bank = bank().await;
    let original = bank
        .engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(300), "1234"),
            "alice",
        )
        .await
        .unwrap();
    // Bob drains his account below the reversal amount
    bank.engine
        .withdraw(WithdrawRequest::new(BOB_ACC, Decimal::from(700), "9999"), "bob")
        .await
        .unwrap();

    let err = bank.engine.reverse(original.id, "ops").await.unwrap_err();
    assert!(matches!(err, TransferError::InsufficientBalance { .. }));
    // Original stays SUCCESS; nothing moved
    assert_eq!(
        bank.ledger.get(original.id).await.unwrap().status,
        TxStatus::Success
    );
    assert_eq!(bank.balance(BOB_ACC).await, Decimal::from(100));
}

#[tokio::test]
async fn test_deposit_credits_without_pin() {
    let bank = bank().await;
    let entry = bank
        .engine
        .deposit(ALICE_ACC, Decimal::new(25_050, 2), None)
        .await
        .unwrap();
    assert_eq!(entry.kind, TxKind::Deposit);
    assert_eq!(entry.status, TxStatus::Success);
    assert!(entry.from_account.is_none());
    assert_eq!(entry.to_account.as_deref(), Some(ALICE_ACC));
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::new(125_050, 2));
}

#[tokio::test]
async fn test_deposit_to_unknown_account_fails() {
    let bank = bank().await;
    let err = bank
        .engine
        .deposit("001202699996", Decimal::from(10), None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransferError::AccountNotFound("001202699996".to_string())
    );
}

#[tokio::test]
async fn test_withdraw_requires_pin_and_balance() {
    let bank = bank().await;
    assert_eq!(
        bank.engine
            .withdraw(
                WithdrawRequest::new(ALICE_ACC, Decimal::from(50), "0000"),
                "alice"
            )
            .await
            .unwrap_err(),
        TransferError::InvalidPin
    );
    assert_eq!(
        bank.engine
            .withdraw(
                WithdrawRequest::new(ALICE_ACC, Decimal::from(5000), "1234"),
                "alice"
            )
            .await
            .unwrap_err(),
        TransferError::InsufficientBalance {
            current: Decimal::from(1000)
        }
    );

    let entry = bank
        .engine
        .withdraw(
            WithdrawRequest::new(ALICE_ACC, Decimal::from(50), "1234"),
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(entry.kind, TxKind::Withdrawal);
    assert_eq!(bank.balance(ALICE_ACC).await, Decimal::from(950));
}

#[tokio::test]
async fn test_every_attempt_leaves_a_terminal_ledger_row() {
    let bank = bank().await;
    bank.engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(100), "1234"),
            "alice",
        )
        .await
        .unwrap();
    bank.engine
        .transfer(
            TransferRequest::new(ALICE_ACC, BOB_ACC, Decimal::from(100), "0000"),
            "alice",
        )
        .await
        .unwrap_err();
    bank.engine
        .withdraw(
            WithdrawRequest::new(ALICE_ACC, Decimal::from(10), "1234"),
            "alice",
        )
        .await
        .unwrap();

    let page = bank.ledger.page_by_account(ALICE_ACC, 0, 10).await;
    assert_eq!(page.total, 3);
    assert!(page.items.iter().all(|e| e.status.is_terminal()));
    // Newest first: withdrawal, failed transfer, successful transfer
    assert_eq!(page.items[0].kind, TxKind::Withdrawal);
    assert_eq!(page.items[1].status, TxStatus::Failed);
    assert_eq!(page.items[2].status, TxStatus::Success);
}
