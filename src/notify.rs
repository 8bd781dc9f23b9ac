//! Best-effort notification dispatch
//!
//! Fire-and-forget side channel. A failed or slow notification must never
//! roll back or delay the money movement that triggered it.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Best-effort delivery; implementations log failures, never propagate.
    async fn notify(&self, identity: &str, message: &str);
}

/// Logs notifications instead of delivering them (no SMS/email transport
/// wired in the core).
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, identity: &str, message: &str) {
        info!(target: "notify", identity, "{}", message);
    }
}

/// Captures notifications in memory; test support.
pub struct MemoryNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn notify(&self, identity: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((identity.to_string(), message.to_string()));
    }
}
