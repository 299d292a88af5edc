use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ErrorBody, ForgotPasswordRequest, LoginRequest, MessageResponse,
            RefreshRequest, RegisterRequest, ResetPasswordRequest,
        },
        error::AuthError,
        extractors::AuthUser,
        repo_types::{Profile, PublicAccount},
        tokens::TokenPair,
    },
    state::AppState,
};

const RESET_REQUESTED: &str = "If the address belongs to an account, a reset link is on its way.";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::AccountAlreadyExists => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::AccountNotActive => StatusCode::FORBIDDEN,
            AuthError::AccountNotFound => StatusCode::NOT_FOUND,
            AuthError::Validation { .. }
            | AuthError::PasswordResetTokenInvalid
            | AuthError::PasswordResetTokenExpired => StatusCode::BAD_REQUEST,
            AuthError::SigningKeyNotConfigured | AuthError::Store(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if self.is_operational() {
            error!(
                error = %self,
                code = self.code(),
                "operational fault, operator attention required"
            );
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let field = match &self {
            AuthError::Validation { field, .. } => Some(*field),
            _ => None,
        };

        let body = ErrorBody {
            error: self.code(),
            message,
            field,
        };
        (status, Json(body)).into_response()
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicAccount>), AuthError> {
    let profile = Profile {
        first_name: payload.first_name,
        last_name: payload.last_name,
    };
    let account = state
        .auth
        .register(&payload.email, &payload.password, profile)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let user = state.auth.login(&payload.email, &payload.password).await?;
    let TokenPair {
        access_token,
        refresh_token,
    } = state.tokens.issue_pair(&user).await?;

    info!(user_id = %user.id, "session issued");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = state
        .tokens
        .refresh_tokens(&payload.refresh_token, payload.user_id)
        .await?;
    Ok(Json(pair))
}

#[instrument(skip(state, claims))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<StatusCode, AuthError> {
    state.auth.logout(claims.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    // Same answer whether or not the account exists. Delivery of the token
    // belongs to the notification service.
    if state.reset.request_password_reset(&payload.email).await?.is_some() {
        info!("password reset token ready for delivery");
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: RESET_REQUESTED,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AuthError> {
    state
        .reset
        .reset_password(&payload.token, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, claims))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicAccount>, AuthError> {
    let account = state.auth.account(claims.user_id).await.map_err(|e| {
        warn!(error = %e, user_id = %claims.user_id, "token subject has no account");
        e
    })?;
    Ok(Json(account))
}
