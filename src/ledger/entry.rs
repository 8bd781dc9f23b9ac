//! Ledger entry model and status state machine
//!
//! Every money movement — attempted or committed — is one entry. An entry is
//! created PENDING before any business check runs, so failed attempts are
//! auditable, and becomes immutable once it reaches a terminal status (the
//! single exception is the out-of-band `Success -> Reversed` transition).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger entry ID — ULID-based unique identifier
///
/// ULIDs are sortable and need no coordination between writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(ulid::Ulid);

impl EntryId {
    /// Generate a new unique EntryId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Money movement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit => "DEPOSIT",
            TxKind::Withdrawal => "WITHDRAWAL",
            TxKind::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry status
///
/// `Pending -> Processing -> {Success | Failed}`, plus `Success -> Reversed`
/// reachable only through the compensating reversal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Reversed,
}

impl TxStatus {
    /// Terminal statuses admit no further processing.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Success | TxStatus::Failed | TxStatus::Reversed)
    }

    /// Whether `self -> next` is a legal status transition.
    pub fn can_transition(&self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Processing)
                | (TxStatus::Processing, TxStatus::Success)
                | (TxStatus::Processing, TxStatus::Failed)
                | (TxStatus::Success, TxStatus::Reversed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Processing => "PROCESSING",
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
            TxStatus::Reversed => "REVERSED",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable money-movement record
///
/// A TRANSFER carries both account refs, a DEPOSIT only `to_account`, a
/// WITHDRAWAL only `from_account`. Refs are explicit account numbers resolved
/// through the stores; there is no object graph behind them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub kind: TxKind,
    pub status: TxStatus,
    pub amount: Decimal,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

impl LedgerEntry {
    /// New PENDING entry. The ledger store assigns the final id and
    /// timestamp on append.
    pub fn pending(kind: TxKind, amount: Decimal, note: &str) -> Self {
        Self {
            id: EntryId::new(),
            kind,
            status: TxStatus::Pending,
            amount,
            from_account: None,
            to_account: None,
            timestamp: Utc::now(),
            note: note.to_string(),
        }
    }

    /// True when the refs match the kind's shape.
    pub fn refs_consistent(&self) -> bool {
        match self.kind {
            TxKind::Deposit => self.from_account.is_none() && self.to_account.is_some(),
            TxKind::Withdrawal => self.from_account.is_some() && self.to_account.is_none(),
            TxKind::Transfer => self.from_account.is_some() && self.to_account.is_some(),
        }
    }

    /// Whether the entry references the given account on either side.
    pub fn touches(&self, account_number: &str) -> bool {
        self.from_account.as_deref() == Some(account_number)
            || self.to_account.as_deref() == Some(account_number)
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entry[{}] {} {} {} -> {} status={}",
            self.id,
            self.kind,
            self.amount,
            self.from_account.as_deref().unwrap_or("-"),
            self.to_account.as_deref().unwrap_or("-"),
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TxStatus::Success.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(TxStatus::Reversed.is_terminal());
        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::Processing.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(TxStatus::Pending.can_transition(TxStatus::Processing));
        assert!(TxStatus::Processing.can_transition(TxStatus::Success));
        assert!(TxStatus::Processing.can_transition(TxStatus::Failed));
        assert!(TxStatus::Success.can_transition(TxStatus::Reversed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!TxStatus::Pending.can_transition(TxStatus::Success));
        assert!(!TxStatus::Failed.can_transition(TxStatus::Processing));
        assert!(!TxStatus::Failed.can_transition(TxStatus::Reversed));
        assert!(!TxStatus::Reversed.can_transition(TxStatus::Success));
        assert!(!TxStatus::Success.can_transition(TxStatus::Processing));
    }

    #[test]
    fn test_refs_consistency() {
        let mut entry = LedgerEntry::pending(TxKind::Transfer, Decimal::from(10), "t");
        assert!(!entry.refs_consistent());
        entry.from_account = Some("a".to_string());
        entry.to_account = Some("b".to_string());
        assert!(entry.refs_consistent());

        let mut deposit = LedgerEntry::pending(TxKind::Deposit, Decimal::from(10), "d");
        deposit.to_account = Some("a".to_string());
        assert!(deposit.refs_consistent());
        deposit.from_account = Some("b".to_string());
        assert!(!deposit.refs_consistent());
    }

    #[test]
    fn test_entry_id_roundtrip() {
        let id = EntryId::new();
        let parsed: EntryId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
