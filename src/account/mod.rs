//! Accounts: models, number generation, stores, cache, and read-side service

pub mod cache;
pub mod models;
pub mod number;
pub mod service;
pub mod store;

pub use cache::AccountCache;
pub use models::{Account, AccountStatus, AccountType, User};
pub use service::AccountService;
pub use store::{
    AccountLock, AccountStore, InMemoryAccountStore, InMemoryUserStore, StoreError, UserStore,
};
