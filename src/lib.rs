//! Credential issuance and session lifecycle for the storefront: registration,
//! password login, logout, access/refresh tokens and password reset.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
