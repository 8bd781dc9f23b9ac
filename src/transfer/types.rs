//! Transfer engine request types

use rust_decimal::Decimal;

/// A two-sided money movement request.
///
/// The PIN is plaintext here (hashed comparison happens in the engine); the
/// OTP is only required once the amount crosses the high-value threshold.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub pin: String,
    pub otp: Option<String>,
    pub note: Option<String>,
}

impl TransferRequest {
    pub fn new(from_account: &str, to_account: &str, amount: Decimal, pin: &str) -> Self {
        Self {
            from_account: from_account.to_string(),
            to_account: to_account.to_string(),
            amount,
            pin: pin.to_string(),
            otp: None,
            note: None,
        }
    }

    pub fn with_otp(mut self, otp: &str) -> Self {
        self.otp = Some(otp.to_string());
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// One-sided cash-out request (ATM / branch).
#[derive(Debug, Clone)]
pub struct WithdrawRequest {
    pub from_account: String,
    pub amount: Decimal,
    pub pin: String,
    pub note: Option<String>,
}

impl WithdrawRequest {
    pub fn new(from_account: &str, amount: Decimal, pin: &str) -> Self {
        Self {
            from_account: from_account.to_string(),
            amount,
            pin: pin.to_string(),
            note: None,
        }
    }
}
