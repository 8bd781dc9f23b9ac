use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::info;

use corebank::account::cache::AccountCache;
use corebank::account::models::{AccountType, User};
use corebank::account::store::{
    AccountStore, InMemoryAccountStore, InMemoryUserStore, UserStore,
};
use corebank::account::AccountService;
use corebank::audit::TracingAuditSink;
use corebank::config::AppConfig;
use corebank::interest::InterestWorker;
use corebank::ledger::InMemoryLedgerStore;
use corebank::logging::init_logging;
use corebank::notify::LogNotifier;
use corebank::security::otp::InMemoryOtpVerifier;
use corebank::security::pin;
use corebank::security::rate_limit::InMemoryRateTracker;
use corebank::security::risk::{HttpRiskEvaluator, RiskEvaluator, StaticRiskEvaluator};
use corebank::transfer::{TransferEngine, TransferRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("COREBANK_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = AppConfig::load(&env);
    let _log_guards = init_logging(&config);
    info!(env, "corebank starting");

    let accounts: Arc<InMemoryAccountStore> = Arc::new(InMemoryAccountStore::new());
    let users: Arc<InMemoryUserStore> = Arc::new(InMemoryUserStore::new());
    let ledger = Arc::new(InMemoryLedgerStore::new());
    let cache = Arc::new(AccountCache::new(
        accounts.clone() as Arc<dyn AccountStore>,
        config.cache_ttl_seconds,
    ));

    let sec = config.security.clone();
    let rate = Arc::new(InMemoryRateTracker::new(
        Duration::from_secs(sec.attempt_window_hours * 3600),
        Duration::from_secs(sec.temp_lock_minutes * 60),
    ));
    let otp = Arc::new(InMemoryOtpVerifier::new(Duration::from_secs(
        sec.otp_ttl_minutes * 60,
    )));
    let risk: Arc<dyn RiskEvaluator> = match &sec.risk_endpoint {
        Some(endpoint) => Arc::new(HttpRiskEvaluator::new(
            endpoint.clone(),
            Duration::from_millis(sec.risk_timeout_ms),
        )?),
        None => Arc::new(StaticRiskEvaluator::allow()),
    };

    let engine = Arc::new(TransferEngine::new(
        accounts.clone(),
        users.clone(),
        ledger.clone(),
        rate,
        risk,
        otp,
        Arc::new(LogNotifier),
        Arc::new(TracingAuditSink),
        cache.clone(),
        sec,
    ));
    let service = AccountService::new(
        accounts.clone(),
        users.clone(),
        ledger.clone(),
        cache.clone(),
        config.branch_code.clone(),
    );

    // Demo seed so a fresh instance has something on its statements
    users
        .insert(User::new("alice".to_string(), pin::hash_pin("1234")?))
        .await?;
    users
        .insert(User::new("bob".to_string(), pin::hash_pin("9999")?))
        .await?;
    let alice_acc = service
        .open_account("alice", AccountType::Checking, Decimal::from(1000))
        .await?;
    let bob_acc = service
        .open_account("bob", AccountType::Savings, Decimal::ZERO)
        .await?;
    engine
        .transfer(
            TransferRequest::new(
                &alice_acc.account_number,
                &bob_acc.account_number,
                Decimal::from(250),
                "1234",
            )
            .with_note("welcome transfer"),
            "alice",
        )
        .await?;
    info!(
        alice = %alice_acc.account_number,
        bob = %bob_acc.account_number,
        "demo accounts seeded"
    );

    if config.interest.enabled {
        let worker = InterestWorker::new(
            accounts.clone(),
            ledger.clone(),
            cache.clone(),
            config.interest.rate,
            Duration::from_secs(config.interest.interval_secs),
        );
        tokio::spawn(worker.run());
        info!(rate = %config.interest.rate, "interest worker started");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, exiting");
    Ok(())
}
