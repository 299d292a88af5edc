use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::error::StoreError;
use crate::auth::repo::CredentialStore;
use crate::auth::repo_types::{Account, AccountChanges, NewAccount};

/// Process-local credential store. Used when no `DATABASE_URL` is configured
/// and by the test suites.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    mutations: AtomicU64,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `create` and `update` calls so far.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Inserts a fully-formed row as-is, bypassing `create`.
    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_with_outstanding_reset(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .filter(|a| a.password_reset_token.is_some())
            .cloned()
            .collect())
    }

    async fn create(&self, new: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let account = Account {
            id: Uuid::new_v4(),
            email: new.email,
            credential_hash: Some(new.credential_hash),
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            is_active: true,
            deleted_at: None,
            refresh_token_hash: None,
            password_reset_token: None,
            password_reset_expires: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(account)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Option<Account>, StoreError> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };
        if !changes.is_empty() {
            changes.apply_to(account, OffsetDateTime::now_utc());
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Some(account.clone()))
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: String,
    ) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(false);
        };
        if account.refresh_token_hash.as_deref() != Some(current) {
            return Ok(false);
        }
        account.refresh_token_hash = Some(next);
        account.updated_at = OffsetDateTime::now_utc();
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
