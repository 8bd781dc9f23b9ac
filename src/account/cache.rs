//! Read-through TTL cache for a user's accounts
//!
//! Replaces annotation-driven cache eviction with an explicit component: the
//! transfer engine calls `invalidate` after every balance mutation, so a
//! cached statement view never outlives the mutation that made it stale.

use cached::Cached;
use cached::stores::TimedCache;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::models::Account;
use super::store::AccountStore;

pub struct AccountCache {
    store: Arc<dyn AccountStore>,
    by_owner: Mutex<TimedCache<u64, Vec<Account>>>,
}

impl AccountCache {
    pub fn new(store: Arc<dyn AccountStore>, ttl_seconds: u64) -> Self {
        Self {
            store,
            by_owner: Mutex::new(TimedCache::with_lifespan(ttl_seconds)),
        }
    }

    /// Accounts owned by `owner_user_id`, loaded from the store on miss.
    pub async fn accounts_for(&self, owner_user_id: u64) -> Vec<Account> {
        {
            let mut cache = self.by_owner.lock().unwrap();
            if let Some(hit) = cache.cache_get(&owner_user_id) {
                return hit.clone();
            }
        }

        debug!(owner = owner_user_id, "[cache] loading accounts from store");
        let loaded = self.store.list_by_owner(owner_user_id).await;
        self.by_owner
            .lock()
            .unwrap()
            .cache_set(owner_user_id, loaded.clone());
        loaded
    }

    /// Drop the cached view after a balance mutation.
    pub fn invalidate(&self, owner_user_id: u64) {
        self.by_owner.lock().unwrap().cache_remove(&owner_user_id);
    }
}
