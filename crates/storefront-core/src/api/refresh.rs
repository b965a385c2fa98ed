//! Single-flight token refresh.
//!
//! Any number of requests can observe a 401 at roughly the same time. The
//! first one to get here spawns the `/refresh` exchange as a task and parks
//! a shared handle in `in_flight`; everyone else clones that handle and
//! awaits the same outcome. The task persists the new pair (or clears the
//! store) and clears `in_flight` before it resolves, so no waiter can
//! observe stale credentials, and it finishes even if every waiter is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::dispatcher::{Dispatcher, PendingRequest};
use super::HttpError;
use crate::auth::{CredentialPair, CredentialStore, SessionState};

pub(crate) const REFRESH_ENDPOINT: &str = "refresh";

/// Why a refresh exchange did not produce new credentials. Every variant is
/// terminal for the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh token rejected (status {0})")]
    Rejected(u16),

    #[error("refresh exchange timed out after {0:?}")]
    TimedOut(Duration),

    #[error("refresh exchange failed: {0}")]
    Network(String),

    #[error("malformed refresh response: {0}")]
    Malformed(String),

    #[error("refresh task failed: {0}")]
    TaskFailed(String),
}

/// Wire shape of `/login` and `/refresh` responses.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

impl From<TokenResponse> for CredentialPair {
    fn from(tokens: TokenResponse) -> Self {
        CredentialPair::new(tokens.access_token, tokens.refresh_token)
    }
}

type RefreshOutcome = Result<CredentialPair, RefreshFailure>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;
type Slot = Arc<Mutex<Option<InFlight>>>;

struct InFlight {
    generation: u64,
    future: SharedRefresh,
}

/// Clears the in-flight marker when the exchange task finishes, including
/// when it panics.
struct SettleGuard {
    slot: Slot,
    generation: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|f| f.generation == self.generation) {
            *slot = None;
        }
    }
}

pub struct RefreshCoordinator {
    dispatcher: Dispatcher,
    store: Arc<dyn CredentialStore>,
    session: SessionState,
    timeout: Duration,
    in_flight: Slot,
    generation: AtomicU64,
    exchanges: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        dispatcher: Dispatcher,
        store: Arc<dyn CredentialStore>,
        session: SessionState,
        timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            store,
            session,
            timeout,
            in_flight: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Obtain fresh credentials, joining an exchange already in flight.
    ///
    /// On success the new pair is already in the store. On failure the store
    /// has been cleared and the session marked anonymous. The exchange runs
    /// as its own task, so dropping every waiter does not abandon it.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.join_or_start().await
    }

    /// Whether an exchange is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of exchanges started over this coordinator's lifetime.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    // Check-and-set happens under one lock, so two callers can never both
    // see Idle and both start an exchange. The task cannot clear the slot
    // before it has been filled because it needs the same lock.
    fn join_or_start(&self) -> SharedRefresh {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref flight) = *slot {
            debug!(generation = flight.generation, "Joining token refresh in flight");
            return flight.future.clone();
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        debug!(generation, "Starting token refresh");

        let guard = SettleGuard {
            slot: Arc::clone(&self.in_flight),
            generation,
        };
        let exchange = Self::exchange(
            self.dispatcher.clone(),
            Arc::clone(&self.store),
            self.session.clone(),
            self.timeout,
        );
        let handle = tokio::spawn(async move {
            let outcome = exchange.await;
            // Marker clears after the store is updated and before waiters
            // see the outcome
            drop(guard);
            outcome
        });

        let future = handle
            .map(|joined| {
                joined.unwrap_or_else(|e| Err(RefreshFailure::TaskFailed(e.to_string())))
            })
            .boxed()
            .shared();
        *slot = Some(InFlight {
            generation,
            future: future.clone(),
        });
        future
    }

    async fn exchange(
        dispatcher: Dispatcher,
        store: Arc<dyn CredentialStore>,
        session: SessionState,
        timeout: Duration,
    ) -> RefreshOutcome {
        let outcome = match store.refresh_token() {
            None => Err(RefreshFailure::MissingRefreshToken),
            Some(refresh_token) => {
                match tokio::time::timeout(timeout, Self::request_pair(&dispatcher, &refresh_token))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RefreshFailure::TimedOut(timeout)),
                }
            }
        };

        match outcome {
            Ok(ref pair) => {
                store.set(pair);
                session.mark_authenticated(None);
                info!("Access token refreshed");
            }
            Err(ref failure) => {
                warn!(reason = %failure, "Token refresh failed, ending session");
                store.clear();
                session.mark_anonymous();
            }
        }
        outcome
    }

    async fn request_pair(dispatcher: &Dispatcher, refresh_token: &str) -> RefreshOutcome {
        let request = PendingRequest::post(REFRESH_ENDPOINT, None);
        match dispatcher.send_with(&request, Some(refresh_token)).await {
            Ok(response) => response
                .json::<TokenResponse>()
                .map(CredentialPair::from)
                .map_err(|e| RefreshFailure::Malformed(e.to_string())),
            Err(HttpError::Unauthorized { .. }) => Err(RefreshFailure::Rejected(401)),
            Err(HttpError::Status { status, .. }) => Err(RefreshFailure::Rejected(status.as_u16())),
            Err(HttpError::Network(e)) => Err(RefreshFailure::Network(e.to_string())),
        }
    }
}
