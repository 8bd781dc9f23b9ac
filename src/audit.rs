//! Audit emission at the engine's exit points
//!
//! No aspect-oriented wrapping: the transfer engine emits exactly one event
//! at each of its two defined exits (success finalize, failure finalize),
//! carrying actor, action kind, and outcome.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Mutex;
use tracing::info;

use crate::ledger::{EntryId, TxStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Transfer,
    Deposit,
    Withdrawal,
    Reversal,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Transfer => "TRANSFER",
            AuditAction::Deposit => "DEPOSIT",
            AuditAction::Withdrawal => "WITHDRAWAL",
            AuditAction::Reversal => "REVERSAL",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor: String,
    pub action: AuditAction,
    pub entry_id: EntryId,
    pub outcome: TxStatus,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor: &str,
        action: AuditAction,
        entry_id: EntryId,
        outcome: TxStatus,
        detail: String,
    ) -> Self {
        Self {
            actor: actor.to_string(),
            action,
            entry_id,
            outcome,
            detail,
            at: Utc::now(),
        }
    }
}

/// Best-effort audit sink; emission must never fail the operation.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Writes audit events into the structured log stream.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            target: "audit",
            actor = %event.actor,
            action = %event.action,
            entry_id = %event.entry_id,
            outcome = %event.outcome,
            "{}",
            event.detail
        );
    }
}

/// Captures events in memory; test support.
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_captures_in_order() {
        let sink = MemoryAuditSink::new();
        sink.emit(AuditEvent::new(
            "alice",
            AuditAction::Transfer,
            EntryId::new(),
            TxStatus::Success,
            "ok".to_string(),
        ));
        sink.emit(AuditEvent::new(
            "alice",
            AuditAction::Withdrawal,
            EntryId::new(),
            TxStatus::Failed,
            "bad pin".to_string(),
        ));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, AuditAction::Transfer);
        assert_eq!(events[1].outcome, TxStatus::Failed);
    }
}
