//! Immutable transaction ledger
//!
//! Append-only record of every money movement, queryable per account with
//! newest-first pagination. Entries are created before the business checks
//! run, so rejected attempts leave an auditable trace.

pub mod entry;
pub mod store;

pub use entry::{EntryId, LedgerEntry, TxKind, TxStatus};
pub use store::{InMemoryLedgerStore, LedgerError, LedgerStore, Page};
