use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::password::{hash_secret, verify_secret, SecretHasher};
use crate::auth::repo::CredentialStore;
use crate::auth::repo_types::{AccountChanges, NewAccount, Profile, PublicAccount, DEFAULT_ROLE};
use crate::auth::validation::{normalize_email, validate_password, validated_email};

/// Registration, password login and logout.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hasher,
            clock,
        }
    }

    #[instrument(skip(self, password, profile))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        profile: Profile,
    ) -> AuthResult<PublicAccount> {
        let email = validated_email(email)?;
        validate_password(password)?;

        if self.store.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::AccountAlreadyExists);
        }

        let credential_hash = hash_secret(&self.hasher, password).await?;
        let account = self
            .store
            .create(NewAccount {
                email,
                credential_hash,
                first_name: clean(profile.first_name),
                last_name: clean(profile.last_name),
                role: DEFAULT_ROLE.to_string(),
            })
            .await?;

        info!(user_id = %account.id, email = %account.email, "account registered");
        Ok(PublicAccount::from(account))
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<PublicAccount> {
        let email = normalize_email(email);

        let Some(account) = self.store.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let Some(credential_hash) = account.credential_hash.as_deref() else {
            warn!(user_id = %account.id, "login on account without password credential");
            return Err(AuthError::InvalidCredentials);
        };

        // Status gate runs before any hash work.
        if !account.can_authenticate() {
            warn!(user_id = %account.id, "login on inactive account");
            return Err(AuthError::AccountNotActive);
        }

        if !verify_secret(&self.hasher, password, credential_hash).await? {
            warn!(user_id = %account.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let updated = self
            .store
            .update(
                account.id,
                AccountChanges {
                    last_login_at: Some(self.clock.now()),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        info!(user_id = %updated.id, "account logged in");
        Ok(PublicAccount::from(updated))
    }

    /// Revokes the refresh token. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub async fn logout(&self, account_id: Uuid) -> AuthResult<()> {
        self.store
            .update(
                account_id,
                AccountChanges {
                    refresh_token_hash: Some(None),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        info!(user_id = %account_id, "account logged out");
        Ok(())
    }

    pub async fn account(&self, account_id: Uuid) -> AuthResult<PublicAccount> {
        self.store
            .find_by_id(account_id)
            .await?
            .map(PublicAccount::from)
            .ok_or(AuthError::AccountNotFound)
    }
}

fn clean(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Account;
    use crate::testing::Harness;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn register_then_login_returns_same_account() {
        let h = Harness::new();
        let registered = h
            .auth
            .register("shopper@example.com", "ValidPass123", Profile::default())
            .await
            .expect("register");
        assert!(registered.is_active);

        let logged_in = h
            .auth
            .login("shopper@example.com", "ValidPass123")
            .await
            .expect("login");
        assert_eq!(logged_in.id, registered.id);
        assert!(logged_in.last_login_at.is_some());
    }

    #[tokio::test]
    async fn email_is_case_insensitive() {
        let h = Harness::new();
        let registered = h
            .auth
            .register("USER@Example.com", "ValidPass123", Profile::default())
            .await
            .unwrap();
        assert_eq!(registered.email, "user@example.com");

        let logged_in = h.auth.login("user@example.com", "ValidPass123").await.unwrap();
        assert_eq!(logged_in.id, registered.id);
    }

    #[tokio::test]
    async fn register_stores_hash_not_plaintext() {
        let h = Harness::new();
        let acc = h
            .auth
            .register("a@example.com", "ValidPass123", Profile::default())
            .await
            .unwrap();
        let row = h.store.find_by_id(acc.id).await.unwrap().unwrap();
        let hash = row.credential_hash.expect("hash stored");
        assert_ne!(hash, "ValidPass123");
        assert!(hash.starts_with("$argon2id$"));
        assert!(row.refresh_token_hash.is_none());
        assert_eq!(row.role, DEFAULT_ROLE);
    }

    #[tokio::test]
    async fn register_keeps_profile_fields() {
        let h = Harness::new();
        let acc = h
            .auth
            .register(
                "a@example.com",
                "ValidPass123",
                Profile {
                    first_name: Some(" Ada ".into()),
                    last_name: Some("".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(acc.first_name.as_deref(), Some("Ada"));
        assert!(acc.last_name.is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let h = Harness::new();
        h.auth
            .register("a@example.com", "ValidPass123", Profile::default())
            .await
            .unwrap();
        let err = h
            .auth
            .register(" A@EXAMPLE.com", "OtherPass123", Profile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountAlreadyExists));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let h = Harness::new();
        let err = h
            .auth
            .register("not-an-email", "ValidPass123", Profile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation { field: "email", .. }));

        let err = h
            .auth
            .register("a@example.com", "short", Profile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation { field: "password", .. }));
        assert_eq!(h.store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let h = Harness::new();
        h.auth
            .register("a@example.com", "ValidPass123", Profile::default())
            .await
            .unwrap();
        let err = h.auth.login("a@example.com", "WrongPass123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unknown_email_never_touches_the_hasher() {
        let h = Harness::new();
        let err = h.auth.login("ghost@example.com", "ValidPass123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(h.hasher.verify_calls(), 0);
    }

    fn stored(email: &str, hash: Option<String>) -> Account {
        let now = OffsetDateTime::now_utc();
        Account {
            id: Uuid::new_v4(),
            email: email.into(),
            credential_hash: hash,
            first_name: None,
            last_name: None,
            role: DEFAULT_ROLE.into(),
            is_active: true,
            deleted_at: None,
            refresh_token_hash: None,
            password_reset_token: None,
            password_reset_expires: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn inactive_account_is_refused_before_compare() {
        let h = Harness::new();
        let hash = h.hasher.hash("ValidPass123").unwrap();
        let mut acc = stored("off@example.com", Some(hash));
        acc.is_active = false;
        h.store.insert_raw(acc).await;

        let err = h.auth.login("off@example.com", "ValidPass123").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotActive));
        assert_eq!(h.hasher.verify_calls(), 0);
    }

    #[tokio::test]
    async fn soft_deleted_account_is_refused_before_compare() {
        let h = Harness::new();
        let hash = h.hasher.hash("ValidPass123").unwrap();
        let mut acc = stored("gone@example.com", Some(hash));
        acc.deleted_at = Some(OffsetDateTime::now_utc());
        h.store.insert_raw(acc).await;

        let err = h.auth.login("gone@example.com", "WrongPass999").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotActive));
        assert_eq!(h.hasher.verify_calls(), 0);
    }

    #[tokio::test]
    async fn account_without_credential_looks_like_unknown_email() {
        let h = Harness::new();
        h.store.insert_raw(stored("oauth@example.com", None)).await;
        let err = h.auth.login("oauth@example.com", "ValidPass123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(h.hasher.verify_calls(), 0);
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let h = Harness::new();
        let acc = h
            .auth
            .register("a@example.com", "ValidPass123", Profile::default())
            .await
            .unwrap();
        h.tokens.generate_refresh_token(acc.id).await.unwrap();

        h.auth.logout(acc.id).await.expect("first logout");
        let row = h.store.find_by_id(acc.id).await.unwrap().unwrap();
        assert!(row.refresh_token_hash.is_none());

        h.auth.logout(acc.id).await.expect("second logout");
        let row = h.store.find_by_id(acc.id).await.unwrap().unwrap();
        assert!(row.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn logout_unknown_account() {
        let h = Harness::new();
        let err = h.auth.logout(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotFound));
    }
}
