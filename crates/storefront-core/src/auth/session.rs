//! Session state as seen by UI code.
//!
//! Derived from the credential store at startup and kept current by the
//! session client; consumers read it or subscribe to changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use super::CredentialStore;
use crate::models::User;

/// What the UI knows about the current session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Anonymous,
    Authenticated {
        /// Identity record, once `/me` has answered
        user: Option<User>,
        since: DateTime<Utc>,
    },
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated { .. })
    }
}

/// In-memory reflection of "is a user logged in".
///
/// Cheap to clone; all clones share one watch channel. Only the session
/// client mutates it, UI code reads it or subscribes to changes.
#[derive(Clone)]
pub struct SessionState {
    tx: Arc<watch::Sender<SessionStatus>>,
}

impl SessionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionStatus::Anonymous);
        Self { tx: Arc::new(tx) }
    }

    /// Derive the initial state from persisted credentials.
    pub fn rehydrate(store: &dyn CredentialStore) -> Self {
        let state = Self::new();
        if store.access_token().is_some() {
            state.mark_authenticated(None);
        }
        state
    }

    pub fn current(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        match &*self.tx.borrow() {
            SessionStatus::Authenticated { user, .. } => user.clone(),
            SessionStatus::Anonymous => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    /// Mark the session authenticated. An existing `since` is kept, and an
    /// already-known user is only replaced by a newer record.
    pub(crate) fn mark_authenticated(&self, user: Option<User>) {
        self.tx.send_if_modified(|status| match status {
            SessionStatus::Anonymous => {
                *status = SessionStatus::Authenticated {
                    user,
                    since: Utc::now(),
                };
                debug!("Session authenticated");
                true
            }
            SessionStatus::Authenticated { user: current, .. } => match user {
                Some(user) if current.as_ref() != Some(&user) => {
                    *current = Some(user);
                    true
                }
                _ => false,
            },
        });
    }

    /// Start a fresh authenticated session, dropping any previous user.
    pub(crate) fn begin(&self, user: Option<User>) {
        self.tx.send_replace(SessionStatus::Authenticated {
            user,
            since: Utc::now(),
        });
        debug!("Session started");
    }

    pub(crate) fn mark_anonymous(&self) {
        self.tx.send_if_modified(|status| {
            if status.is_authenticated() {
                *status = SessionStatus::Anonymous;
                debug!("Session cleared");
                true
            } else {
                false
            }
        });
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialPair, MemoryCredentialStore, StoredTokens};

    fn user() -> User {
        User {
            id: 1,
            name: "Ana".to_string(),
            email: "a@b.com".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_rehydrate_from_access_token() {
        let store = MemoryCredentialStore::new();
        assert!(!SessionState::rehydrate(&store).is_authenticated());

        store.set(&CredentialPair::new("tok1", "ref1"));
        assert!(SessionState::rehydrate(&store).is_authenticated());
    }

    #[test]
    fn test_lone_refresh_token_starts_anonymous() {
        let store = MemoryCredentialStore::with_tokens(StoredTokens {
            access_token: None,
            refresh_token: Some("ref1".to_string()),
        });
        assert!(!SessionState::rehydrate(&store).is_authenticated());
    }

    #[test]
    fn test_user_attaches_to_existing_session() {
        let state = SessionState::new();
        state.mark_authenticated(None);
        assert!(state.user().is_none());

        state.mark_authenticated(Some(user()));
        assert_eq!(state.user(), Some(user()));

        // A later bare mark does not forget the user
        state.mark_authenticated(None);
        assert_eq!(state.user(), Some(user()));
    }

    #[test]
    fn test_subscribers_see_changes_once() {
        let state = SessionState::new();
        let mut rx = state.subscribe();

        state.mark_authenticated(Some(user()));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());

        state.mark_anonymous();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        // Already anonymous: nothing to publish
        state.mark_anonymous();
        assert!(!rx.has_changed().unwrap());
    }
}
