//! Authentication state for the storefront client.
//!
//! This module provides:
//! - `CredentialStore`: durable holder for the access/refresh token pair,
//!   backed by memory, a JSON file, or the OS keychain via keyring
//! - `SessionState`: in-memory "is someone logged in" view consumed by UI code
//!
//! Token expiry is never tracked locally; it is discovered when the server
//! answers 401.

pub mod credentials;
pub mod session;

pub use credentials::{
    CredentialPair, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    MemoryCredentialStore, StoredTokens,
};
pub use session::{SessionState, SessionStatus};
