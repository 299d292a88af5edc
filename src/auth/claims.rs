use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload of an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: Uuid, // account ID
    pub email: String,
    pub role: String,
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

impl AccessClaims {
    /// Signature checks say nothing about content; reject payloads that
    /// decode but carry nothing usable.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.user_id.is_nil() && !self.email.trim().is_empty() && !self.role.trim().is_empty()
    }
}
