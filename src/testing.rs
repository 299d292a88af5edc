//! Test doubles and a service harness over the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use time::{Duration, OffsetDateTime};

use crate::auth::clock::Clock;
use crate::auth::jwt::JwtCodec;
use crate::auth::memory::MemoryCredentialStore;
use crate::auth::password::{Argon2Hasher, SecretHasher};
use crate::auth::random::OsRngTokenGenerator;
use crate::auth::reset::PasswordResetFlow;
use crate::auth::services::AuthService;
use crate::auth::tokens::TokenService;
use crate::config::{
    AppConfig, Environment, HashingConfig, JwtConfig, TokenConfig, MAX_TTL_MINUTES,
};

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

/// Low-cost Argon2 that counts calls.
pub struct CountingHasher {
    inner: Argon2Hasher,
    hashes: AtomicUsize,
    verifies: AtomicUsize,
}

impl CountingHasher {
    pub fn new() -> Self {
        Self {
            inner: Argon2Hasher::new(&cheap_hashing()).unwrap(),
            hashes: AtomicUsize::new(0),
            verifies: AtomicUsize::new(0),
        }
    }

    pub fn hash_calls(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }
}

impl SecretHasher for CountingHasher {
    fn hash(&self, secret: &str) -> anyhow::Result<String> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        self.inner.hash(secret)
    }

    fn verify(&self, secret: &str, digest: &str) -> anyhow::Result<bool> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(secret, digest)
    }
}

pub fn cheap_hashing() -> HashingConfig {
    HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn test_config(secret: Option<&str>) -> AppConfig {
    AppConfig {
        environment: Environment::Development,
        database_url: None,
        jwt: JwtConfig {
            secret: secret.map(str::to_owned),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 15,
        },
        hashing: cheap_hashing(),
        tokens: TokenConfig::default(),
    }
}

/// The three services wired over shared doubles.
pub struct Harness {
    pub store: Arc<MemoryCredentialStore>,
    pub hasher: Arc<CountingHasher>,
    pub clock: Arc<ManualClock>,
    pub auth: AuthService,
    pub tokens: TokenService,
    pub reset: PasswordResetFlow,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&test_config(Some("test-secret")))
    }

    pub fn without_signing_key() -> Self {
        Self::with_config(&test_config(None))
    }

    fn with_config(cfg: &AppConfig) -> Self {
        let store = Arc::new(MemoryCredentialStore::new());
        let hasher = Arc::new(CountingHasher::new());
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let generator = Arc::new(OsRngTokenGenerator);

        let auth = AuthService::new(store.clone(), hasher.clone(), clock.clone());
        let tokens = TokenService::new(
            store.clone(),
            hasher.clone(),
            generator.clone(),
            clock.clone(),
            JwtCodec::from_config(&cfg.jwt),
            cfg.tokens.refresh_token_bytes,
        );
        let reset = PasswordResetFlow::new(
            store.clone(),
            hasher.clone(),
            generator,
            clock.clone(),
            cfg.tokens.reset_token_bytes,
            Duration::minutes(cfg.tokens.reset_ttl_minutes.clamp(1, MAX_TTL_MINUTES)),
        );

        Self {
            store,
            hasher,
            clock,
            auth,
            tokens,
            reset,
        }
    }
}
