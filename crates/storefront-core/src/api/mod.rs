//! REST API client module for the storefront service.
//!
//! This module provides the authenticated request pipeline:
//!
//! - `Dispatcher`: sends one request with the current bearer token and
//!   classifies the outcome
//! - `RefreshCoordinator`: turns concurrent 401s into a single `/refresh`
//! - `SessionClient`: public entry point with retry-once recovery, plus
//!   login, logout and startup bootstrap
//!
//! `AccountApi` and `CatalogApi` are thin typed mappings on top.

pub mod account;
pub mod catalog;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod refresh;

pub use account::AccountApi;
pub use catalog::{CatalogApi, ResourceFeed, DEFAULT_POPULAR_LIMIT};
pub use client::SessionClient;
pub use dispatcher::{Dispatcher, PendingRequest, Response};
pub use error::{ApiError, HttpError};
pub use refresh::{RefreshCoordinator, RefreshFailure};
