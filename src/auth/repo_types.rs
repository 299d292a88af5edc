use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Role given to self-registered accounts.
pub const DEFAULT_ROLE: &str = "customer";

/// Account record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String, // normalized: trimmed + lowercase
    #[serde(skip_serializing)]
    pub credential_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<OffsetDateTime>,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// Inactive and soft-deleted accounts are refused identically.
    pub fn can_authenticate(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn reset_ticket(&self) -> Option<ResetTicket> {
        match (&self.password_reset_token, self.password_reset_expires) {
            (Some(token_hash), Some(expires_at)) => Some(ResetTicket {
                token_hash: token_hash.clone(),
                expires_at,
            }),
            _ => None,
        }
    }
}

/// Fields needed to insert an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub credential_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
}

/// Optional profile data accepted at registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Hash and absolute expiry of an outstanding password reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTicket {
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
}

/// Partial update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub credential_hash: Option<String>,
    pub refresh_token_hash: Option<Option<String>>,
    pub password_reset: Option<Option<ResetTicket>>,
    pub last_login_at: Option<OffsetDateTime>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        self.credential_hash.is_none()
            && self.refresh_token_hash.is_none()
            && self.password_reset.is_none()
            && self.last_login_at.is_none()
    }

    pub(crate) fn apply_to(self, account: &mut Account, now: OffsetDateTime) {
        if let Some(hash) = self.credential_hash {
            account.credential_hash = Some(hash);
        }
        if let Some(refresh) = self.refresh_token_hash {
            account.refresh_token_hash = refresh;
        }
        if let Some(reset) = self.password_reset {
            let (token, expires) = match reset {
                Some(ticket) => (Some(ticket.token_hash), Some(ticket.expires_at)),
                None => (None, None),
            };
            account.password_reset_token = token;
            account.password_reset_expires = expires;
        }
        if let Some(at) = self.last_login_at {
            account.last_login_at = Some(at);
        }
        account.updated_at = now;
    }
}

/// Public part of the account returned to callers. Never carries a hash.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PublicAccount {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Account> for PublicAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            role: account.role.clone(),
            is_active: account.is_active,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
        }
    }
}

impl From<Account> for PublicAccount {
    fn from(account: Account) -> Self {
        Self::from(&account)
    }
}
