use std::sync::Arc;

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HashingConfig;

/// One-way salted hashing of secrets (passwords, refresh and reset tokens).
pub trait SecretHasher: Send + Sync {
    fn hash(&self, secret: &str) -> anyhow::Result<String>;

    /// `Ok(false)` on mismatch; `Err` only when `digest` cannot be parsed.
    fn verify(&self, secret: &str, digest: &str) -> anyhow::Result<bool>;
}

/// Argon2id with configurable cost.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(cfg: &HashingConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, secret: &str, digest: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(digest).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Runs `hash` on the blocking pool.
pub(crate) async fn hash_secret(
    hasher: &Arc<dyn SecretHasher>,
    secret: &str,
) -> anyhow::Result<String> {
    let hasher = Arc::clone(hasher);
    let secret = secret.to_owned();
    tokio::task::spawn_blocking(move || hasher.hash(&secret))
        .await
        .context("hashing task failed")?
}

/// Runs `verify` on the blocking pool.
pub(crate) async fn verify_secret(
    hasher: &Arc<dyn SecretHasher>,
    secret: &str,
    digest: &str,
) -> anyhow::Result<bool> {
    let hasher = Arc::clone(hasher);
    let secret = secret.to_owned();
    let digest = digest.to_owned();
    tokio::task::spawn_blocking(move || hasher.verify(&secret, &digest))
        .await
        .context("verify task failed")?
}
