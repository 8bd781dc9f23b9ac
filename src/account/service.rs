//! Account-facing operations that do not move money
//!
//! Opening accounts, balance reads, ownership-checked statements. Balance
//! mutation stays in the transfer engine; this service only reads rows and
//! appends new ones.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::account::cache::AccountCache;
use crate::account::models::{Account, AccountType};
use crate::account::number;
use crate::account::store::{AccountStore, StoreError, UserStore};
use crate::ledger::{LedgerEntry, LedgerStore, Page};
use crate::transfer::TransferError;

/// Attempts before giving up on a random-collision-free account number.
const MAX_NUMBER_ATTEMPTS: usize = 5;

pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    users: Arc<dyn UserStore>,
    ledger: Arc<dyn LedgerStore>,
    cache: Arc<AccountCache>,
    branch_code: String,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        users: Arc<dyn UserStore>,
        ledger: Arc<dyn LedgerStore>,
        cache: Arc<AccountCache>,
        branch_code: String,
    ) -> Self {
        Self {
            accounts,
            users,
            ledger,
            cache,
            branch_code,
        }
    }

    /// Open a new account for the actor, generating its number.
    ///
    /// The store enforces number uniqueness; on the (rare) random collision
    /// we regenerate rather than fail the request.
    pub async fn open_account(
        &self,
        actor: &str,
        account_type: AccountType,
        opening_balance: Decimal,
    ) -> Result<Account, TransferError> {
        if opening_balance < Decimal::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        let user = self
            .users
            .find_by_username(actor)
            .await
            .map_err(|_| TransferError::NotFound)?;

        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let account_number = number::generate(&self.branch_code);
            let account = Account::new(
                account_number.clone(),
                account_type,
                user.id,
                opening_balance,
            );
            match self.accounts.insert(account).await {
                Ok(created) => {
                    self.cache.invalidate(user.id);
                    info!(
                        actor,
                        account_number = %created.account_number,
                        account_type = %created.account_type,
                        "account opened"
                    );
                    return Ok(created);
                }
                Err(StoreError::DuplicateAccountNumber(n)) => {
                    warn!(account_number = %n, "account number collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(TransferError::Internal(
            "could not generate a unique account number".to_string(),
        ))
    }

    /// Current balance, ownership-checked.
    pub async fn balance(&self, actor: &str, account_number: &str) -> Result<Decimal, TransferError> {
        let account = self.owned_account(actor, account_number).await?;
        Ok(account.balance)
    }

    /// Newest-first statement page, ownership-checked.
    pub async fn statement(
        &self,
        actor: &str,
        account_number: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Page<LedgerEntry>, TransferError> {
        self.owned_account(actor, account_number).await?;
        Ok(self
            .ledger
            .page_by_account(account_number, page, page_size)
            .await)
    }

    /// All accounts the actor owns (served through the TTL cache).
    pub async fn my_accounts(&self, actor: &str) -> Result<Vec<Account>, TransferError> {
        let user = self
            .users
            .find_by_username(actor)
            .await
            .map_err(|_| TransferError::NotFound)?;
        Ok(self.cache.accounts_for(user.id).await)
    }

    async fn owned_account(
        &self,
        actor: &str,
        account_number: &str,
    ) -> Result<Account, TransferError> {
        let user = self
            .users
            .find_by_username(actor)
            .await
            .map_err(|_| TransferError::NotFound)?;
        let account = self.accounts.find(account_number).await?;
        if account.owner_user_id != user.id {
            return Err(TransferError::Forbidden);
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::models::User;
    use crate::account::store::{InMemoryAccountStore, InMemoryUserStore};
    use crate::ledger::{InMemoryLedgerStore, TxKind, TxStatus};
    use crate::security::pin;

    async fn service() -> (AccountService, Arc<InMemoryLedgerStore>) {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let users = Arc::new(InMemoryUserStore::new());
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let cache = Arc::new(AccountCache::new(
            accounts.clone() as Arc<dyn AccountStore>,
            300,
        ));
        users
            .insert(User::new(
                "alice".to_string(),
                pin::hash_pin("1234").unwrap(),
            ))
            .await
            .unwrap();
        users
            .insert(User::new("bob".to_string(), pin::hash_pin("9999").unwrap()))
            .await
            .unwrap();
        (
            AccountService::new(accounts, users, ledger.clone(), cache, "001".to_string()),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_open_account_generates_valid_number() {
        let (service, _) = service().await;
        let account = service
            .open_account("alice", AccountType::Savings, Decimal::from(100))
            .await
            .unwrap();
        assert!(number::verify(&account.account_number));
        assert!(account.account_number.starts_with("001"));
        assert_eq!(account.balance, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_open_account_unknown_user() {
        let (service, _) = service().await;
        let err = service
            .open_account("ghost", AccountType::Savings, Decimal::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::NotFound);
    }

    #[tokio::test]
    async fn test_negative_opening_balance_rejected() {
        let (service, _) = service().await;
        let err = service
            .open_account("alice", AccountType::Checking, Decimal::from(-1))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::InvalidAmount);
    }

    #[tokio::test]
    async fn test_balance_and_statement_are_ownership_checked() {
        let (service, ledger) = service().await;
        let account = service
            .open_account("alice", AccountType::Checking, Decimal::from(50))
            .await
            .unwrap();

        assert_eq!(
            service
                .balance("alice", &account.account_number)
                .await
                .unwrap(),
            Decimal::from(50)
        );
        assert_eq!(
            service
                .balance("bob", &account.account_number)
                .await
                .unwrap_err(),
            TransferError::Forbidden
        );

        let mut entry =
            LedgerEntry::pending(TxKind::Deposit, Decimal::from(10), "seed");
        entry.to_account = Some(account.account_number.clone());
        let mut entry = ledger.append(entry).await.unwrap();
        entry.status = TxStatus::Processing;
        ledger.update(&entry).await.unwrap();
        entry.status = TxStatus::Success;
        ledger.update(&entry).await.unwrap();

        let page = service
            .statement("alice", &account.account_number, 0, 10)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(
            service
                .statement("bob", &account.account_number, 0, 10)
                .await
                .unwrap_err(),
            TransferError::Forbidden
        );
    }

    #[tokio::test]
    async fn test_my_accounts_lists_only_mine() {
        let (service, _) = service().await;
        service
            .open_account("alice", AccountType::Savings, Decimal::ZERO)
            .await
            .unwrap();
        service
            .open_account("alice", AccountType::Checking, Decimal::ZERO)
            .await
            .unwrap();
        service
            .open_account("bob", AccountType::Checking, Decimal::ZERO)
            .await
            .unwrap();

        assert_eq!(service.my_accounts("alice").await.unwrap().len(), 2);
        assert_eq!(service.my_accounts("bob").await.unwrap().len(), 1);
    }
}
