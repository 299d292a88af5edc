use thiserror::Error;

/// Failures raised by a [`CredentialStore`](super::repo::CredentialStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Every failure the auth core reports to its caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("an account with this email already exists")]
    AccountAlreadyExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is not active")]
    AccountNotActive,
    #[error("account not found")]
    AccountNotFound,
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token")]
    InvalidToken,
    #[error("token signing key is not configured")]
    SigningKeyNotConfigured,
    #[error("password reset token is invalid")]
    PasswordResetTokenInvalid,
    #[error("password reset token has expired")]
    PasswordResetTokenExpired,
    #[error("credential store failure: {0}")]
    Store(StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccountAlreadyExists => "account_already_exists",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AccountNotActive => "account_not_active",
            Self::AccountNotFound => "account_not_found",
            Self::Validation { .. } => "validation_error",
            Self::TokenExpired => "token_expired",
            Self::InvalidToken => "invalid_token",
            Self::SigningKeyNotConfigured => "signing_key_not_configured",
            Self::PasswordResetTokenInvalid => "password_reset_token_invalid",
            Self::PasswordResetTokenExpired => "password_reset_token_expired",
            Self::Store(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Deployment or infrastructure faults that operators must look at,
    /// as opposed to rejections of a particular request.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::SigningKeyNotConfigured | Self::Store(_) | Self::Internal(_)
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::AccountAlreadyExists,
            other => Self::Store(other),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
