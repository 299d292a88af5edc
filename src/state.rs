use std::sync::Arc;

use time::Duration;
use tracing::warn;

use crate::auth::clock::{Clock, SystemClock};
use crate::auth::jwt::JwtCodec;
use crate::auth::memory::MemoryCredentialStore;
use crate::auth::password::{Argon2Hasher, SecretHasher};
use crate::auth::random::{OsRngTokenGenerator, TokenGenerator};
use crate::auth::repo::{CredentialStore, PgCredentialStore};
use crate::auth::reset::PasswordResetFlow;
use crate::auth::services::AuthService;
use crate::auth::tokens::TokenService;
use crate::config::{AppConfig, MAX_TTL_MINUTES};
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub tokens: Arc<TokenService>,
    pub reset: Arc<PasswordResetFlow>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn CredentialStore> = match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::migrate(&pool).await?;
                Arc::new(PgCredentialStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL not set; accounts are kept in memory and lost on restart");
                Arc::new(MemoryCredentialStore::new())
            }
        };
        if config.jwt.secret.is_none() {
            warn!("JWT_SECRET not set; token issuance will fail until it is configured");
        }

        let hasher = Arc::new(Argon2Hasher::new(&config.hashing)?);
        Ok(Self::from_parts(
            config,
            store,
            hasher,
            Arc::new(OsRngTokenGenerator),
            Arc::new(SystemClock),
        ))
    }

    /// Wires the services around one shared store instance.
    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn SecretHasher>,
        generator: Arc<dyn TokenGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = AuthService::new(store.clone(), hasher.clone(), clock.clone());
        let tokens = TokenService::new(
            store.clone(),
            hasher.clone(),
            generator.clone(),
            clock.clone(),
            JwtCodec::from_config(&config.jwt),
            config.tokens.refresh_token_bytes,
        );
        let reset = PasswordResetFlow::new(
            store,
            hasher,
            generator,
            clock,
            config.tokens.reset_token_bytes,
            Duration::minutes(config.tokens.reset_ttl_minutes.clamp(1, MAX_TTL_MINUTES)),
        );
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            tokens: Arc::new(tokens),
            reset: Arc::new(reset),
        }
    }
}
