use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use tracing::warn;

use crate::auth::claims::AccessClaims;
use crate::auth::error::AuthError;
use crate::state::AppState;

/// Verified access-token claims of the caller.
pub struct AuthUser(pub AccessClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Read Authorization header
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::InvalidToken)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AuthError::InvalidToken)?;

        let claims = state.tokens.verify_access_token(token.trim()).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            e
        })?;
        Ok(AuthUser(claims))
    }
}
