//! Transfer engine: the only component allowed to move money
//!
//! Every balance mutation in the system flows through [`TransferEngine`]:
//! transfers, deposits, withdrawals, and reversals. Each operation writes a
//! ledger row before touching any balance and finalizes it to a terminal
//! status afterwards, so the ledger is a complete record of attempts, not
//! just of successes.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::TransferEngine;
pub use error::TransferError;
pub use types::{TransferRequest, WithdrawRequest};

#[cfg(test)]
mod integration_tests;
