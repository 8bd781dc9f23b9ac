//! Failed-PIN rate tracking
//!
//! Ephemeral TTL counters per identity plus a separate temporary-lock
//! marker. Increments are atomic under the shard lock of the map entry, so
//! concurrent failures from the same identity never race a read-modify-write.
//! The escalation policy (temp lock at N, hard lock at M) lives in the
//! transfer engine; this component only counts and expires.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

#[async_trait]
pub trait RateTracker: Send + Sync {
    /// Record one failed PIN attempt; returns the cumulative count inside
    /// the current rolling window.
    async fn record_failure(&self, identity: &str) -> u32;

    /// Whether a temporary lock marker currently exists for the identity.
    async fn is_temporarily_locked(&self, identity: &str) -> bool;

    /// Set the temporary lock marker.
    async fn lock_temporarily(&self, identity: &str);

    /// Clear the attempt counter (successful PIN, or hard-lock escalation).
    async fn reset(&self, identity: &str);
}

struct AttemptWindow {
    count: u32,
    expires_at: Instant,
}

/// In-memory TTL counter store.
pub struct InMemoryRateTracker {
    /// Rolling expiry of the attempt counter, set on first increment only.
    window: Duration,
    temp_lock_ttl: Duration,
    attempts: DashMap<String, AttemptWindow>,
    temp_locks: DashMap<String, Instant>,
}

impl InMemoryRateTracker {
    pub fn new(window: Duration, temp_lock_ttl: Duration) -> Self {
        Self {
            window,
            temp_lock_ttl,
            attempts: DashMap::new(),
            temp_locks: DashMap::new(),
        }
    }
}

#[async_trait]
impl RateTracker for InMemoryRateTracker {
    async fn record_failure(&self, identity: &str) -> u32 {
        let now = Instant::now();
        match self.attempts.entry(identity.to_string()) {
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if window.expires_at <= now {
                    // Previous window lapsed; this failure opens a new one.
                    window.count = 1;
                    window.expires_at = now + self.window;
                } else {
                    window.count += 1;
                }
                window.count
            }
            Entry::Vacant(vacant) => {
                vacant.insert(AttemptWindow {
                    count: 1,
                    expires_at: now + self.window,
                });
                1
            }
        }
    }

    async fn is_temporarily_locked(&self, identity: &str) -> bool {
        let now = Instant::now();
        let expires_at = self.temp_locks.get(identity).map(|e| *e.value());
        match expires_at {
            Some(expiry) if expiry > now => true,
            Some(_) => {
                self.temp_locks.remove_if(identity, |_, expiry| *expiry <= now);
                false
            }
            None => false,
        }
    }

    async fn lock_temporarily(&self, identity: &str) {
        self.temp_locks
            .insert(identity.to_string(), Instant::now() + self.temp_lock_ttl);
    }

    async fn reset(&self, identity: &str) {
        self.attempts.remove(identity);
    }
}
