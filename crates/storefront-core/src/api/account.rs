use super::client::{SessionClient, ME_ENDPOINT};
use super::ApiError;
use crate::models::{Registration, User};

const REGISTER_ENDPOINT: &str = "register";

/// Account endpoints that are plain request/response mappings.
/// Login, logout and session restore live on `SessionClient`.
#[derive(Clone)]
pub struct AccountApi {
    client: SessionClient,
}

impl AccountApi {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, registration: &Registration) -> Result<User, ApiError> {
        self.client.post(REGISTER_ENDPOINT, registration).await
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.client.get(ME_ENDPOINT).await
    }
}
