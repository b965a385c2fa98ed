//! Session client: the one entry point UI code uses to talk to the API.
//!
//! Wraps the dispatcher with 401 recovery. A request that comes back 401 is
//! retried at most once, after the refresh coordinator has produced new
//! credentials (or after noticing another request already did). A second
//! 401, or a failed refresh, ends the session with `SessionExpired`.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::dispatcher::{Dispatcher, PendingRequest, Response};
use super::refresh::{RefreshCoordinator, TokenResponse};
use super::{ApiError, HttpError};
use crate::auth::{CredentialPair, CredentialStore, SessionState, SessionStatus};
use crate::config::Config;
use crate::models::User;

const LOGIN_ENDPOINT: &str = "login";
const LOGOUT_ENDPOINT: &str = "logout";
pub(crate) const ME_ENDPOINT: &str = "me";

struct Inner {
    dispatcher: Dispatcher,
    coordinator: RefreshCoordinator,
    store: Arc<dyn CredentialStore>,
    session: SessionState,
}

/// Clone is cheap; clones share credentials, session state and the refresh
/// coordinator, so concurrent tasks coordinate their refreshes.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let dispatcher = Dispatcher::new(config, Arc::clone(&store))?;
        let session = SessionState::rehydrate(store.as_ref());
        let coordinator = RefreshCoordinator::new(
            dispatcher.clone(),
            Arc::clone(&store),
            session.clone(),
            config.refresh_timeout(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                dispatcher,
                coordinator,
                store,
                session,
            }),
        })
    }

    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    // ===== Request pipeline =====

    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Response, ApiError> {
        self.execute(PendingRequest::new(method, endpoint, body)).await
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.call(endpoint, Method::GET, None).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = Self::encode(body)?;
        self.call(endpoint, Method::POST, Some(body)).await?.json()
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = Self::encode(body)?;
        self.call(endpoint, Method::PUT, Some(body)).await?.json()
    }

    pub async fn delete(&self, endpoint: &str) -> Result<(), ApiError> {
        self.call(endpoint, Method::DELETE, None).await?;
        Ok(())
    }

    fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
    }

    async fn execute(&self, mut request: PendingRequest) -> Result<Response, ApiError> {
        let sent_with = self.inner.store.access_token();
        match self
            .inner
            .dispatcher
            .send_with(&request, sent_with.as_deref())
            .await
        {
            Err(HttpError::Unauthorized { .. }) => {}
            other => return other.map_err(ApiError::from),
        }

        debug!(endpoint = %request.endpoint, "Request unauthorized, recovering");
        self.recover(sent_with.as_deref()).await?;

        request.retried = true;
        let retry_with = self.inner.store.access_token();
        match self
            .inner
            .dispatcher
            .send_with(&request, retry_with.as_deref())
            .await
        {
            Err(HttpError::Unauthorized { .. }) => {
                warn!(endpoint = %request.endpoint, "Still unauthorized after refresh, ending session");
                self.teardown();
                Err(ApiError::SessionExpired)
            }
            other => other.map_err(ApiError::from),
        }
    }

    /// Make sure the store holds credentials newer than `rejected`.
    async fn recover(&self, rejected: Option<&str>) -> Result<(), ApiError> {
        // Another request may have rotated the token while this one was on
        // the wire; its 401 is then stale and needs no exchange of its own.
        if let Some(current) = self.inner.store.access_token() {
            if rejected != Some(current.as_str()) {
                debug!("Access token already rotated, retrying without refresh");
                return Ok(());
            }
        }

        match self.inner.coordinator.refresh().await {
            Ok(_) => Ok(()),
            Err(failure) => {
                debug!(reason = %failure, "Recovery failed");
                Err(ApiError::SessionExpired)
            }
        }
    }

    fn teardown(&self) {
        self.inner.store.clear();
        self.inner.session.mark_anonymous();
    }

    // ===== Session lifecycle =====

    /// Exchange email and password for a token pair.
    ///
    /// Failures carry the server's message verbatim; session state is left
    /// untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let request = PendingRequest::post(
            LOGIN_ENDPOINT,
            Some(json!({ "email": email, "password": password })),
        );

        let response = match self.inner.dispatcher.send_with(&request, None).await {
            Ok(response) => response,
            Err(HttpError::Unauthorized { body }) => {
                return Err(ApiError::ValidationError {
                    status: StatusCode::UNAUTHORIZED.as_u16(),
                    message: ApiError::server_message(StatusCode::UNAUTHORIZED, &body),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let pair: CredentialPair = response.json::<TokenResponse>()?.into();
        self.inner.store.set(&pair);
        self.inner.session.begin(None);
        info!("Login successful");

        match self.probe().await {
            Ok(user) => self.inner.session.mark_authenticated(Some(user)),
            Err(e) => warn!(error = %e, "Logged in but failed to fetch user"),
        }
        Ok(())
    }

    /// Best-effort server-side logout, then forget local credentials.
    /// Logging out while anonymous does nothing.
    pub async fn logout(&self) {
        if self.inner.store.load().is_empty() {
            debug!("Logout while anonymous, nothing to do");
            self.inner.session.mark_anonymous();
            return;
        }

        if let Err(e) = self.call(LOGOUT_ENDPOINT, Method::POST, None).await {
            debug!(error = %e, "Remote logout failed, clearing local session anyway");
        }
        self.teardown();
        info!("Logged out");
    }

    /// Restore the session from persisted credentials at startup.
    ///
    /// Probes `/me` with the stored access token; if that fails and a
    /// refresh token exists, refreshes once and probes again. Anything else
    /// leaves the client anonymous with an empty store.
    pub async fn bootstrap(&self) -> SessionStatus {
        let stored = self.inner.store.load();

        if stored.access_token.is_some() {
            match self.probe().await {
                Ok(user) => {
                    self.inner.session.mark_authenticated(Some(user));
                    info!("Session restored");
                    return self.inner.session.current();
                }
                Err(e) => debug!(error = %e, "Stored access token not accepted"),
            }
        }

        if stored.refresh_token.is_some() {
            match self.inner.coordinator.refresh().await {
                Ok(_) => match self.probe().await {
                    Ok(user) => {
                        self.inner.session.mark_authenticated(Some(user));
                        info!("Session restored after refresh");
                        return self.inner.session.current();
                    }
                    Err(e) => warn!(error = %e, "Identity probe failed after refresh"),
                },
                Err(failure) => debug!(reason = %failure, "Startup refresh failed"),
            }
        }

        self.teardown();
        self.inner.session.current()
    }

    /// Identity probe without 401 recovery; bootstrap drives its own refresh.
    async fn probe(&self) -> Result<User, ApiError> {
        let response = self
            .inner
            .dispatcher
            .send(&PendingRequest::get(ME_ENDPOINT))
            .await?;
        response.json()
    }
}
