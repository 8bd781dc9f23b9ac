//! Transfer engine error taxonomy
//!
//! Every failure is a distinct, structured kind so callers can decide retry
//! vs. abort vs. escalate. The engine records each of these on the FAILED
//! ledger row before re-raising it; nothing is silently swallowed.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::account::store::StoreError;
use crate::ledger::LedgerError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("user not found")]
    NotFound,

    #[error("you do not own this account")]
    Forbidden,

    #[error("account locked, contact the bank to unlock")]
    AccountLocked,

    #[error("too many failed PIN attempts, account paused")]
    TooManyAttempts,

    #[error("transaction blocked by risk engine")]
    RiskBlocked,

    #[error("high-value transfer requires an OTP")]
    OtpRequired,

    #[error("invalid OTP code")]
    InvalidOtp,

    #[error("OTP expired or never requested")]
    OtpExpired,

    #[error("incorrect PIN")]
    InvalidPin,

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("insufficient balance (current: {current})")]
    InsufficientBalance { current: Decimal },

    #[error("internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Stable error code for API responses and audit notes.
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::NotFound => "NOT_FOUND",
            TransferError::Forbidden => "FORBIDDEN",
            TransferError::AccountLocked => "ACCOUNT_LOCKED",
            TransferError::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            TransferError::RiskBlocked => "RISK_BLOCKED",
            TransferError::OtpRequired => "OTP_REQUIRED",
            TransferError::InvalidOtp => "INVALID_OTP",
            TransferError::OtpExpired => "OTP_EXPIRED",
            TransferError::InvalidPin => "INVALID_PIN",
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::InvalidRequest(_) => "INVALID_REQUEST",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            TransferError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the same request may succeed later without manual
    /// intervention (e.g. after a lock TTL lapses).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferError::TooManyAttempts
                | TransferError::OtpExpired
                | TransferError::Internal(_)
        )
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(number) => TransferError::AccountNotFound(number),
            StoreError::UserNotFound(_) => TransferError::NotFound,
            other => TransferError::Internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for TransferError {
    fn from(e: LedgerError) -> Self {
        TransferError::Internal(e.to_string())
    }
}
