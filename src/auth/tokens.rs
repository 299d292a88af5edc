use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::claims::AccessClaims;
use crate::auth::clock::Clock;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::jwt::JwtCodec;
use crate::auth::password::{hash_secret, verify_secret, SecretHasher};
use crate::auth::random::TokenGenerator;
use crate::auth::repo::CredentialStore;
use crate::auth::repo_types::{AccountChanges, PublicAccount};

/// Access token plus the refresh token that replaces it.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Access-token issuance and verification; refresh-token issuance and rotation.
///
/// Each account holds at most one refresh-token hash. Storing a new hash is
/// what revokes the previous token, so every issuance path goes through
/// [`TokenService::store_new_refresh_token`].
pub struct TokenService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn SecretHasher>,
    generator: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    codec: JwtCodec,
    refresh_token_bytes: usize,
}

impl TokenService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
        codec: JwtCodec,
        refresh_token_bytes: usize,
    ) -> Self {
        Self {
            store,
            hasher,
            generator,
            clock,
            codec,
            refresh_token_bytes,
        }
    }

    pub fn generate_access_token(&self, account: &PublicAccount) -> AuthResult<String> {
        self.codec.sign(account, self.clock.now())
    }

    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.codec.verify(token)
    }

    /// Issues a refresh token, revoking whatever token the account held before.
    /// The plaintext is returned only here.
    #[instrument(skip(self))]
    pub async fn generate_refresh_token(&self, account_id: Uuid) -> AuthResult<String> {
        if self.store.find_by_id(account_id).await?.is_none() {
            return Err(AuthError::AccountNotFound);
        }
        self.store_new_refresh_token(account_id).await
    }

    /// Exchanges a refresh token for a new pair. The presented token is dead
    /// once this returns, whether or not the caller receives the response.
    #[instrument(skip(self, presented))]
    pub async fn refresh_tokens(&self, presented: &str, account_id: Uuid) -> AuthResult<TokenPair> {
        let account = self
            .store
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let Some(stored_hash) = account.refresh_token_hash.as_deref() else {
            warn!(user_id = %account_id, "refresh without an active refresh token");
            return Err(AuthError::InvalidToken);
        };
        if !verify_secret(&self.hasher, presented, stored_hash).await? {
            warn!(user_id = %account_id, "refresh token mismatch");
            return Err(AuthError::InvalidToken);
        }

        // Sign first: a missing signing key must not burn the caller's token.
        let access_token = self.generate_access_token(&PublicAccount::from(&account))?;

        let refresh_token = self.generator.generate(self.refresh_token_bytes);
        let next_hash = hash_secret(&self.hasher, &refresh_token).await?;
        if !self
            .store
            .swap_refresh_token(account_id, stored_hash, next_hash)
            .await?
        {
            warn!(user_id = %account_id, "refresh token already rotated by a concurrent request");
            return Err(AuthError::InvalidToken);
        }

        info!(user_id = %account_id, "refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Fresh pair for a just-authenticated account.
    #[instrument(skip(self, account), fields(user_id = %account.id))]
    pub async fn issue_pair(&self, account: &PublicAccount) -> AuthResult<TokenPair> {
        let access_token = self.generate_access_token(account)?;
        let refresh_token = self.store_new_refresh_token(account.id).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn store_new_refresh_token(&self, account_id: Uuid) -> AuthResult<String> {
        let token = self.generator.generate(self.refresh_token_bytes);
        let token_hash = hash_secret(&self.hasher, &token).await?;
        self.store
            .update(
                account_id,
                AccountChanges {
                    refresh_token_hash: Some(Some(token_hash)),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        Ok(token)
    }
}
