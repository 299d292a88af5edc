use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

/// Upper bound for any configured token lifetime (30 days).
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 30;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret. Optional outside production; signing then fails per call.
    pub secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub refresh_token_bytes: usize,
    pub reset_token_bytes: usize,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub hashing: HashingConfig,
    pub tokens: TokenConfig,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_token_bytes: 40,
            reset_token_bytes: 32,
            reset_ttl_minutes: 60,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        let secret = lookup("JWT_SECRET").filter(|s| !s.trim().is_empty());
        if environment == Environment::Production && secret.is_none() {
            anyhow::bail!("JWT_SECRET must be set when APP_ENV=production");
        }

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if environment == Environment::Production && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when APP_ENV=production");
        }

        let jwt = JwtConfig {
            secret,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "storefront".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "storefront-customers".into()),
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 15)?,
        };

        let defaults = HashingConfig::default();
        let hashing = HashingConfig {
            memory_kib: parse_or(&lookup, "HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "HASH_PARALLELISM", defaults.parallelism)?,
        };

        let defaults = TokenConfig::default();
        let tokens = TokenConfig {
            refresh_token_bytes: parse_or(
                &lookup,
                "REFRESH_TOKEN_BYTES",
                defaults.refresh_token_bytes,
            )?,
            reset_token_bytes: parse_or(&lookup, "RESET_TOKEN_BYTES", defaults.reset_token_bytes)?,
            reset_ttl_minutes: parse_or(
                &lookup,
                "RESET_TOKEN_TTL_MINUTES",
                defaults.reset_ttl_minutes,
            )?,
        };

        check_ttl("JWT_TTL_MINUTES", jwt.ttl_minutes)?;
        check_ttl("RESET_TOKEN_TTL_MINUTES", tokens.reset_ttl_minutes)?;
        if tokens.refresh_token_bytes < 16 || tokens.reset_token_bytes < 16 {
            anyhow::bail!("token byte lengths must be at least 16");
        }

        Ok(Self {
            environment,
            database_url,
            jwt,
            hashing,
            tokens,
        })
    }
}

fn check_ttl(key: &str, minutes: i64) -> anyhow::Result<()> {
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("{key} must be between 1 and {MAX_TTL_MINUTES} minutes, got {minutes}");
    }
    Ok(())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
