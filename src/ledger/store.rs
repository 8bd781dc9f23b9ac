//! Append-only ledger store
//!
//! Entries are appended once and then move only through legal status
//! transitions. Terminal rows are immutable (except `Success -> Reversed`);
//! corrections are new compensating entries, never edits.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Mutex;
use thiserror::Error;

use super::entry::{EntryId, LedgerEntry, TxKind, TxStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("ledger entry not found: {0}")]
    NotFound(String),

    #[error("illegal status transition: {0} -> {1}")]
    IllegalTransition(TxStatus, TxStatus),

    #[error("account refs do not match entry kind {0}")]
    InconsistentRefs(TxKind),
}

/// One page of a newest-first ledger query.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Assign id and timestamp, store the entry, return the stored copy.
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry, LedgerError>;

    /// Persist a status transition (plus refs/note captured along the way).
    /// Any other mutation of a terminal row is rejected.
    async fn update(&self, entry: &LedgerEntry) -> Result<(), LedgerError>;

    async fn get(&self, id: EntryId) -> Result<LedgerEntry, LedgerError>;

    /// Newest-first page of entries touching the account.
    async fn page_by_account(
        &self,
        account_number: &str,
        page: usize,
        page_size: usize,
    ) -> Page<LedgerEntry>;

    /// Entries stuck in PROCESSING longer than `older_than`. These need
    /// reconciliation; they are never successes.
    async fn stale_processing(&self, older_than: Duration) -> Vec<LedgerEntry>;
}

/// In-memory append-only ledger.
pub struct InMemoryLedgerStore {
    rows: DashMap<EntryId, LedgerEntry>,
    /// Append order; pagination walks this newest-first.
    order: Mutex<Vec<EntryId>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, mut entry: LedgerEntry) -> Result<LedgerEntry, LedgerError> {
        entry.id = EntryId::new();
        entry.timestamp = Utc::now();
        self.rows.insert(entry.id, entry.clone());
        self.order.lock().unwrap().push(entry.id);
        Ok(entry)
    }

    async fn update(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut existing = self
            .rows
            .get_mut(&entry.id)
            .ok_or_else(|| LedgerError::NotFound(entry.id.to_string()))?;

        if existing.status == entry.status {
            if existing.status.is_terminal() {
                return Err(LedgerError::IllegalTransition(existing.status, entry.status));
            }
        } else if !existing.status.can_transition(entry.status) {
            return Err(LedgerError::IllegalTransition(existing.status, entry.status));
        }

        // A committed entry must carry the refs its kind requires; failed
        // rows may legitimately stop with partial refs.
        if entry.status == TxStatus::Success && !entry.refs_consistent() {
            return Err(LedgerError::InconsistentRefs(entry.kind));
        }

        *existing = entry.clone();
        Ok(())
    }

    async fn get(&self, id: EntryId) -> Result<LedgerEntry, LedgerError> {
        self.rows
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    async fn page_by_account(
        &self,
        account_number: &str,
        page: usize,
        page_size: usize,
    ) -> Page<LedgerEntry> {
        let order = self.order.lock().unwrap().clone();
        let matched: Vec<LedgerEntry> = order
            .iter()
            .rev()
            .filter_map(|id| self.rows.get(id).map(|r| r.value().clone()))
            .filter(|e| e.touches(account_number))
            .collect();

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect();

        Page {
            items,
            page,
            page_size,
            total,
        }
    }

    async fn stale_processing(&self, older_than: Duration) -> Vec<LedgerEntry> {
        let cutoff = Utc::now() - older_than;
        self.rows
            .iter()
            .filter(|r| r.status == TxStatus::Processing && r.timestamp < cutoff)
            .map(|r| r.value().clone())
            .collect()
    }
}
