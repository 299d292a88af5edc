use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod clock;
mod dto;
pub mod error;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod random;
pub mod repo;
pub mod repo_types;
pub mod reset;
pub mod services;
pub mod tokens;
pub mod validation;

pub use error::{AuthError, AuthResult, StoreError};
pub use repo::CredentialStore;
pub use reset::PasswordResetFlow;
pub use services::AuthService;
pub use tokens::{TokenPair, TokenService};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
