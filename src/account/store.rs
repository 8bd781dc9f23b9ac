//! Account and user stores
//!
//! In-memory row stores with the locking discipline the transfer engine
//! depends on: `find_for_update` hands out an exclusive per-row lock that is
//! held until the surrounding operation commits or aborts. Two concurrent
//! transfers touching the same sender row therefore serialize at the lock,
//! never at a stale balance read.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::{Account, User};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("duplicate account number: {0}")]
    DuplicateAccountNumber(String),

    #[error("duplicate username: {0}")]
    DuplicateUsername(String),
}

/// Exclusive lock on a single account row.
///
/// Mutations made through the guard are the persisted row state; dropping the
/// guard ends the transaction and releases the row to the next writer.
pub struct AccountLock {
    guard: OwnedMutexGuard<Account>,
}

impl Deref for AccountLock {
    type Target = Account;

    fn deref(&self) -> &Account {
        &self.guard
    }
}

impl DerefMut for AccountLock {
    fn deref_mut(&mut self) -> &mut Account {
        &mut self.guard
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Read a row without locking it.
    async fn find(&self, account_number: &str) -> Result<Account, StoreError>;

    /// Acquire the exclusive row lock. Held until the returned guard drops.
    async fn find_for_update(&self, account_number: &str) -> Result<AccountLock, StoreError>;

    /// Insert a new account, assigning its id. Duplicate numbers are
    /// rejected, never overwritten.
    async fn insert(&self, account: Account) -> Result<Account, StoreError>;

    /// All accounts owned by a user.
    async fn list_by_owner(&self, owner_user_id: u64) -> Vec<Account>;

    /// Snapshot of every account number (interest accrual sweep).
    async fn list_account_numbers(&self) -> Vec<String>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<User, StoreError>;

    /// Insert a new user, assigning its id. Duplicate usernames rejected.
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    /// Set or clear the persistent hard-lock flag.
    async fn set_locked(&self, username: &str, locked: bool) -> Result<(), StoreError>;
}

/// In-memory account store: one `tokio::sync::Mutex` per row.
pub struct InMemoryAccountStore {
    rows: DashMap<String, Arc<Mutex<Account>>>,
    next_id: AtomicU64,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find(&self, account_number: &str) -> Result<Account, StoreError> {
        let row = self
            .rows
            .get(account_number)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::AccountNotFound(account_number.to_string()))?;
        let account = row.lock().await;
        Ok(account.clone())
    }

    async fn find_for_update(&self, account_number: &str) -> Result<AccountLock, StoreError> {
        let row = self
            .rows
            .get(account_number)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::AccountNotFound(account_number.to_string()))?;
        Ok(AccountLock {
            guard: row.lock_owned().await,
        })
    }

    async fn insert(&self, mut account: Account) -> Result<Account, StoreError> {
        match self.rows.entry(account.account_number.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateAccountNumber(account.account_number)),
            Entry::Vacant(v) => {
                account.id = self.next_id.fetch_add(1, Ordering::Relaxed);
                v.insert(Arc::new(Mutex::new(account.clone())));
                Ok(account)
            }
        }
    }

    async fn list_by_owner(&self, owner_user_id: u64) -> Vec<Account> {
        // Clone the row handles first: awaiting while holding a map ref
        // would block writers on the same shard.
        let handles: Vec<Arc<Mutex<Account>>> =
            self.rows.iter().map(|r| r.value().clone()).collect();
        let mut out = Vec::new();
        for handle in handles {
            let account = handle.lock().await;
            if account.owner_user_id == owner_user_id {
                out.push(account.clone());
            }
        }
        out
    }

    async fn list_account_numbers(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.key().clone()).collect()
    }
}

/// In-memory user store keyed by username.
pub struct InMemoryUserStore {
    rows: DashMap<String, User>,
    next_id: AtomicU64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.rows
            .get(username)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    async fn insert(&self, mut user: User) -> Result<User, StoreError> {
        match self.rows.entry(user.username.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateUsername(user.username)),
            Entry::Vacant(v) => {
                user.id = self.next_id.fetch_add(1, Ordering::Relaxed);
                v.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn set_locked(&self, username: &str, locked: bool) -> Result<(), StoreError> {
        let mut row = self
            .rows
            .get_mut(username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
        row.locked = locked;
        Ok(())
    }
}
