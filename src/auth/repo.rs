use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::error::StoreError;
use crate::auth::repo_types::{Account, AccountChanges, NewAccount};

const ACCOUNT_COLUMNS: &str = "id, email, credential_hash, first_name, last_name, role, \
     is_active, deleted_at, refresh_token_hash, password_reset_token, password_reset_expires, \
     last_login_at, created_at, updated_at";

/// Durable account repository shared by the auth services.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Accounts that currently hold a password reset token, expired or not.
    async fn find_with_outstanding_reset(&self) -> Result<Vec<Account>, StoreError>;

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Applies `changes` and returns the updated row, or `None` if `id` is unknown.
    async fn update(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Option<Account>, StoreError>;

    /// Replaces the refresh-token hash only while it still equals `current`.
    /// Returns `false` when another writer got there first.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: String,
    ) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(account)
    }

    async fn find_with_outstanding_reset(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE password_reset_token IS NOT NULL"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let created = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (id, email, credential_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&account.email)
        .bind(&account.credential_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.role)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: AccountChanges,
    ) -> Result<Option<Account>, StoreError> {
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE accounts SET updated_at = now()");
        if let Some(hash) = changes.credential_hash {
            qb.push(", credential_hash = ").push_bind(hash);
        }
        if let Some(refresh) = changes.refresh_token_hash {
            qb.push(", refresh_token_hash = ").push_bind(refresh);
        }
        if let Some(reset) = changes.password_reset {
            let (token, expires) = match reset {
                Some(ticket) => (Some(ticket.token_hash), Some(ticket.expires_at)),
                None => (None, None),
            };
            qb.push(", password_reset_token = ").push_bind(token);
            qb.push(", password_reset_expires = ").push_bind(expires);
        }
        if let Some(at) = changes.last_login_at {
            qb.push(", last_login_at = ").push_bind(at);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(ACCOUNT_COLUMNS);

        let updated = qb
            .build_query_as::<Account>()
            .fetch_optional(&self.db)
            .await?;
        Ok(updated)
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: String,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_token_hash = $1, updated_at = now()
            WHERE id = $2 AND refresh_token_hash = $3
            "#,
        )
        .bind(next)
        .bind(id)
        .bind(current)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
