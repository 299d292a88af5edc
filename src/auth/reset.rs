use std::sync::Arc;

use anyhow::Context;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::password::{hash_secret, SecretHasher};
use crate::auth::random::TokenGenerator;
use crate::auth::repo::CredentialStore;
use crate::auth::repo_types::{Account, AccountChanges, ResetTicket};
use crate::auth::validation::{validate_password, validated_email};

/// Self-service password reset: issue a one-hour token, redeem it once.
pub struct PasswordResetFlow {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    token_bytes: usize,
    validity: Duration,
}

impl PasswordResetFlow {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
        token_bytes: usize,
        validity: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            generator,
            clock,
            token_bytes,
            validity,
        }
    }

    /// Returns the plaintext token for out-of-band delivery, or `None` when
    /// no account matches. Callers must answer identically in both cases.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<Option<String>> {
        let email = validated_email(email)?;
        let account = self.store.find_by_email(&email).await?;

        // Hash a token either way so both outcomes cost the same.
        let token = self.generator.generate(self.token_bytes);
        let token_hash = hash_secret(&self.hasher, &token).await?;
        let Some(account) = account else {
            return Ok(None);
        };
        let expires_at = self.clock.now() + self.validity;
        self.store
            .update(
                account.id,
                AccountChanges {
                    password_reset: Some(Some(ResetTicket {
                        token_hash,
                        expires_at,
                    })),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        info!(user_id = %account.id, "password reset token issued");
        Ok(Some(token))
    }

    /// Redeems a reset token. Possession is proven before expiry is looked at.
    #[instrument(skip(self, presented, new_password))]
    pub async fn reset_password(&self, presented: &str, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;

        let candidates = self.store.find_with_outstanding_reset().await?;
        let Some((account_id, expires_at)) = self.find_matching(presented, candidates).await? else {
            warn!("password reset with unknown token");
            return Err(AuthError::PasswordResetTokenInvalid);
        };

        if expires_at <= self.clock.now() {
            warn!(user_id = %account_id, "password reset with expired token");
            return Err(AuthError::PasswordResetTokenExpired);
        }

        let credential_hash = hash_secret(&self.hasher, new_password).await?;
        self.store
            .update(
                account_id,
                AccountChanges {
                    credential_hash: Some(credential_hash),
                    password_reset: Some(None),
                    refresh_token_hash: Some(None),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        info!(user_id = %account_id, "password reset completed");
        Ok(())
    }

    /// Linear scan: hashes are salted, so the token cannot be looked up directly.
    async fn find_matching(
        &self,
        presented: &str,
        candidates: Vec<Account>,
    ) -> AuthResult<Option<(Uuid, OffsetDateTime)>> {
        let tickets: Vec<(Uuid, ResetTicket)> = candidates
            .iter()
            .filter_map(|a| a.reset_ticket().map(|t| (a.id, t)))
            .collect();
        if tickets.is_empty() {
            return Ok(None);
        }

        let hasher = Arc::clone(&self.hasher);
        let presented = presented.to_owned();
        let found = tokio::task::spawn_blocking(move || {
            tickets.into_iter().find_map(|(id, ticket)| {
                match hasher.verify(&presented, &ticket.token_hash) {
                    Ok(true) => Some((id, ticket.expires_at)),
                    Ok(false) => None,
                    Err(e) => {
                        warn!(user_id = %id, error = %e, "unreadable reset token hash skipped");
                        None
                    }
                }
            })
        })
        .await
        .context("reset token scan failed")?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{Profile, PublicAccount};
    use crate::testing::Harness;

    async fn registered(h: &Harness, email: &str) -> PublicAccount {
        h.auth
            .register(email, "OldPass1234", Profile::default())
            .await
            .expect("register")
    }

    #[tokio::test]
    async fn unknown_email_returns_none_without_mutation() {
        let h = Harness::new();
        registered(&h, "known@example.com").await;
        let before = h.store.mutation_count();

        let token = h.reset.request_password_reset("ghost@example.com").await.unwrap();
        assert!(token.is_none());
        assert_eq!(h.store.mutation_count(), before);
    }

    #[tokio::test]
    async fn unknown_email_does_the_same_hashing_work() {
        let h = Harness::new();
        registered(&h, "known@example.com").await;
        let after_register = h.hasher.hash_calls();

        h.reset.request_password_reset("known@example.com").await.unwrap();
        let per_known = h.hasher.hash_calls() - after_register;

        h.reset.request_password_reset("ghost@example.com").await.unwrap();
        let per_unknown = h.hasher.hash_calls() - after_register - per_known;

        assert_eq!(per_known, 1);
        assert_eq!(per_unknown, per_known);
    }

    #[tokio::test]
    async fn request_stores_hash_and_one_hour_expiry() {
        let h = Harness::new();
        let acc = registered(&h, "a@example.com").await;
        let t0 = h.clock.now();

        let token = h
            .reset
            .request_password_reset("  A@Example.com")
            .await
            .unwrap()
            .expect("token for known account");
        let row = h.store.find_by_id(acc.id).await.unwrap().unwrap();
        let ticket = row.reset_ticket().expect("ticket stored");
        assert_ne!(ticket.token_hash, token);
        assert_eq!(ticket.expires_at, t0 + Duration::hours(1));
    }

    #[tokio::test]
    async fn reset_changes_password_and_clears_fields() {
        let h = Harness::new();
        let acc = registered(&h, "a@example.com").await;
        h.tokens.generate_refresh_token(acc.id).await.unwrap();
        let token = h.reset.request_password_reset("a@example.com").await.unwrap().unwrap();

        h.reset.reset_password(&token, "NewPass5678").await.expect("reset");

        let err = h.auth.login("a@example.com", "OldPass1234").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        h.auth.login("a@example.com", "NewPass5678").await.expect("new password works");

        let row = h.store.find_by_id(acc.id).await.unwrap().unwrap();
        assert!(row.password_reset_token.is_none());
        assert!(row.password_reset_expires.is_none());
        assert!(row.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let h = Harness::new();
        registered(&h, "a@example.com").await;
        let token = h.reset.request_password_reset("a@example.com").await.unwrap().unwrap();
        h.reset.reset_password(&token, "NewPass5678").await.unwrap();
        let err = h.reset.reset_password(&token, "Another9999").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordResetTokenInvalid));
    }

    #[tokio::test]
    async fn expiry_boundary() {
        let h = Harness::new();
        registered(&h, "a@example.com").await;
        registered(&h, "b@example.com").await;

        let early = h.reset.request_password_reset("a@example.com").await.unwrap().unwrap();
        let late = h.reset.request_password_reset("b@example.com").await.unwrap().unwrap();

        h.clock.advance(Duration::minutes(59));
        h.reset.reset_password(&early, "NewPass5678").await.expect("valid at T+59");

        h.clock.advance(Duration::minutes(2));
        let err = h.reset.reset_password(&late, "NewPass5678").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordResetTokenExpired));
    }

    #[tokio::test]
    async fn wrong_token_is_invalid() {
        let h = Harness::new();
        registered(&h, "a@example.com").await;
        h.reset.request_password_reset("a@example.com").await.unwrap();
        let err = h.reset.reset_password("forged-token", "NewPass5678").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordResetTokenInvalid));
    }

    #[tokio::test]
    async fn no_outstanding_tokens_is_invalid() {
        let h = Harness::new();
        registered(&h, "a@example.com").await;
        let err = h.reset.reset_password("anything", "NewPass5678").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordResetTokenInvalid));
    }

    #[tokio::test]
    async fn expired_wrong_token_reports_invalid_not_expired() {
        let h = Harness::new();
        registered(&h, "a@example.com").await;
        h.reset.request_password_reset("a@example.com").await.unwrap();
        h.clock.advance(Duration::hours(2));
        let err = h.reset.reset_password("forged-token", "NewPass5678").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordResetTokenInvalid));
    }

    #[tokio::test]
    async fn newer_request_replaces_older_token() {
        let h = Harness::new();
        registered(&h, "a@example.com").await;
        let first = h.reset.request_password_reset("a@example.com").await.unwrap().unwrap();
        let second = h.reset.request_password_reset("a@example.com").await.unwrap().unwrap();
        let err = h.reset.reset_password(&first, "NewPass5678").await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordResetTokenInvalid));
        h.reset.reset_password(&second, "NewPass5678").await.expect("latest token");
    }

    #[tokio::test]
    async fn weak_new_password_is_rejected_before_scan() {
        let h = Harness::new();
        registered(&h, "a@example.com").await;
        let token = h.reset.request_password_reset("a@example.com").await.unwrap().unwrap();
        let err = h.reset.reset_password(&token, "short").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation { field: "password", .. }));
        assert_eq!(h.hasher.verify_calls(), 0);
    }
}
