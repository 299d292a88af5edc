use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};

use crate::auth::claims::AccessClaims;
use crate::auth::error::{AuthError, AuthResult};
use crate::auth::repo_types::PublicAccount;
use crate::config::{JwtConfig, MAX_TTL_MINUTES};

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies HS256 access tokens.
#[derive(Clone)]
pub struct JwtCodec {
    keys: Option<SigningKeys>,
    issuer: String,
    audience: String,
    access_ttl: TimeDuration,
}

impl JwtCodec {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        let keys = cfg
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|secret| SigningKeys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            });
        Self {
            keys,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: TimeDuration::minutes(cfg.ttl_minutes.clamp(0, MAX_TTL_MINUTES)),
        }
    }

    fn keys(&self) -> AuthResult<&SigningKeys> {
        self.keys.as_ref().ok_or_else(|| {
            error!("JWT signing secret is not configured; token operations are unavailable");
            AuthError::SigningKeyNotConfigured
        })
    }

    pub fn sign(&self, account: &PublicAccount, now: OffsetDateTime) -> AuthResult<String> {
        let keys = self.keys()?;
        let exp = now + self.access_ttl;
        let claims = AccessClaims {
            user_id: account.id,
            email: account.email.clone(),
            role: account.role.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("jwt encode failed: {e}")))?;
        debug!(user_id = %account.id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> AuthResult<AccessClaims> {
        let keys = self.keys()?;
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<AccessClaims>(token, &keys.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    debug!(error = %e, "jwt rejected");
                    AuthError::InvalidToken
                }
            }
        })?;

        if !data.claims.is_well_formed() {
            debug!("jwt payload is structurally invalid");
            return Err(AuthError::InvalidToken);
        }
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}
