//! Data models for accounts and their owning users

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account product type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Savings,
    Checking,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Checking => "CHECKING",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account lifecycle status
///
/// Accounts are never deleted; closure is the `Closed` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
    Closed,
}

impl AccountStatus {
    /// Only Active accounts may participate in money movement.
    #[inline]
    pub fn can_transact(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
            AccountStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bank account row
///
/// `balance` uses exact decimal arithmetic and is mutated only by the
/// transfer engine (and its one-sided deposit/withdraw variants) through an
/// exclusive row lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    /// Unique, immutable 12-digit number (Luhn check digit at the end).
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub currency: String,
    pub owner_user_id: u64,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new ACTIVE account. The store assigns the final id on insert.
    pub fn new(
        account_number: String,
        account_type: AccountType,
        owner_user_id: u64,
        opening_balance: Decimal,
    ) -> Self {
        Self {
            id: 0,
            account_number,
            account_type,
            balance: opening_balance,
            currency: "USD".to_string(),
            owner_user_id,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        }
    }
}

/// Ledger-relevant user fields
///
/// `locked` is the persistent hard lock, distinct from the rate tracker's
/// temporary lock. Set by lockout escalation, cleared only manually.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// Argon2 PHC string of the transaction PIN.
    pub pin_hash: String,
    pub locked: bool,
}

impl User {
    pub fn new(username: String, pin_hash: String) -> Self {
        Self {
            id: 0,
            username,
            pin_hash,
            locked: false,
        }
    }
}
