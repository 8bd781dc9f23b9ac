//! Core banking ledger service
//!
//! Modules:
//! - `config` — YAML application configuration
//! - `logging` — rolling-file tracing setup
//! - `account` — account/user models, Luhn numbers, row stores, cache,
//!   read-side service
//! - `ledger` — append-only transaction ledger with status lifecycle
//! - `security` — PIN hashing, failed-attempt tracking, OTP step-up, risk
//!   call-out
//! - `transfer` — the transfer engine (the only component that moves money)
//! - `interest` — scheduled interest accrual
//! - `audit` / `notify` — side-effect sinks at the engine's exits

pub mod account;
pub mod audit;
pub mod config;
pub mod interest;
pub mod ledger;
pub mod logging;
pub mod notify;
pub mod security;
pub mod transfer;

pub use account::AccountService;
pub use config::AppConfig;
pub use transfer::{TransferEngine, TransferError, TransferRequest, WithdrawRequest};
