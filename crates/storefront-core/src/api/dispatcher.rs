//! Single-shot HTTP dispatch against the storefront API.
//!
//! The dispatcher sends exactly one request and classifies the outcome. It
//! never retries and never refreshes tokens; that is layered on top by
//! `SessionClient`. The refresh exchange itself goes through here directly,
//! which is what keeps a failing refresh from recursing into another refresh.

use std::sync::Arc;

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{ApiError, HttpError};
use crate::auth::CredentialStore;
use crate::config::Config;

/// One logical request, kept around so it can be re-sent after a refresh.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    /// Path relative to the API base, query string included
    pub endpoint: String,
    pub body: Option<Value>,
    /// Set once the request has been re-sent after a refresh
    pub retried: bool,
}

impl PendingRequest {
    pub fn new(method: Method, endpoint: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body,
            retried: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint, None)
    }

    pub fn post(endpoint: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::POST, endpoint, body)
    }
}

/// A successful (2xx) response with its body read.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            ApiError::MalformedResponse(format!("{} (status {})", e, self.status))
        })
    }
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
}

impl Dispatcher {
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            store,
        })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Send with whatever access token is stored at this moment.
    pub async fn send(&self, request: &PendingRequest) -> Result<Response, HttpError> {
        let token = self.store.access_token();
        self.send_with(request, token.as_deref()).await
    }

    /// Send with an explicit bearer token, or anonymously with `None`.
    pub async fn send_with(
        &self,
        request: &PendingRequest,
        bearer: Option<&str>,
    ) -> Result<Response, HttpError> {
        let url = self.url(&request.endpoint);
        debug!(
            method = %request.method,
            endpoint = %request.endpoint,
            authenticated = bearer.is_some(),
            retried = request.retried,
            "Dispatching request"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        Self::check_response(response).await
    }

    async fn check_response(response: reqwest::Response) -> Result<Response, HttpError> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(Response { status, body })
        } else if status == StatusCode::UNAUTHORIZED {
            Err(HttpError::Unauthorized { body })
        } else {
            Err(HttpError::Status { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;

    #[test]
    fn test_url_joins_without_double_slash() {
        let dispatcher = Dispatcher::new(
            &Config::with_base("http://localhost:8000/api/"),
            Arc::new(MemoryCredentialStore::new()),
        )
        .unwrap();
        assert_eq!(dispatcher.url("/me"), "http://localhost:8000/api/me");
        assert_eq!(
            dispatcher.url("resources?page=2"),
            "http://localhost:8000/api/resources?page=2"
        );
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let response = Response {
            status: StatusCode::OK,
            body: "<html>".to_string(),
        };
        let parsed: Result<Value, _> = response.json();
        assert!(matches!(parsed, Err(ApiError::MalformedResponse(_))));
    }
}
