//! Storefront client core.
//!
//! An authenticated request pipeline for the storefront API: bearer tokens
//! are attached to every call, 401s are recovered by a single shared token
//! refresh, and a session that cannot be recovered is reported to the
//! caller as `ApiError::SessionExpired` rather than acted on here.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{AccountApi, ApiError, CatalogApi, ResourceFeed, SessionClient};
pub use auth::{CredentialPair, CredentialStore, SessionState, SessionStatus};
pub use config::Config;
