#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use storefront_core::auth::{CredentialPair, CredentialStore, MemoryCredentialStore, StoredTokens};
use storefront_core::{Config, SessionClient};
use wiremock::MockServer;

pub fn client_for(server: &MockServer, store: &Arc<MemoryCredentialStore>) -> SessionClient {
    client_with(Config::with_base(server.uri()), store)
}

pub fn client_with(config: Config, store: &Arc<MemoryCredentialStore>) -> SessionClient {
    let store: Arc<dyn CredentialStore> = store.clone();
    SessionClient::new(&config, store).expect("client should build")
}

pub fn store_with(access: &str, refresh: &str) -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    store.set(&CredentialPair::new(access, refresh));
    store
}

pub fn store_with_refresh_only(refresh: &str) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_tokens(StoredTokens {
        access_token: None,
        refresh_token: Some(refresh.to_string()),
    }))
}

pub fn tokens(access: &str, refresh: &str) -> Value {
    json!({ "access_token": access, "refresh_token": refresh })
}

pub fn user() -> Value {
    json!({ "id": 1, "name": "Ana", "email": "a@b.com" })
}

/// The store must hold a full pair or nothing.
pub fn assert_pair_or_empty(store: &MemoryCredentialStore) {
    let tokens = store.load();
    assert_eq!(
        tokens.access_token.is_some(),
        tokens.refresh_token.is_some(),
        "credential store holds half a pair: {:?}",
        tokens
    );
}
