//! Durable holders for the access/refresh token pair.
//!
//! Every backend writes both tokens in a single operation so a reader never
//! sees one half of a pair. Reads and writes never fail: storage errors are
//! logged and the store behaves as if it were empty.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SERVICE_NAME: &str = "storefront";

/// Keychain account holding the serialized token pair
const KEYRING_ACCOUNT: &str = "session-tokens";

/// Credentials file name in the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// An authenticated session's bearer tokens. Opaque to the client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "access_token")]
    pub access: String,
    #[serde(rename = "refresh_token")]
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Keep tokens out of logs and panic messages
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Raw persisted values, stored under the `access_token` / `refresh_token`
/// keys. Normally both or neither are present, but state written by older
/// clients may hold only one of them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }

    pub fn into_pair(self) -> Option<CredentialPair> {
        match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) => Some(CredentialPair { access, refresh }),
            _ => None,
        }
    }
}

impl From<&CredentialPair> for StoredTokens {
    fn from(pair: &CredentialPair) -> Self {
        Self {
            access_token: Some(pair.access.clone()),
            refresh_token: Some(pair.refresh.clone()),
        }
    }
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub trait CredentialStore: Send + Sync {
    /// Read whatever is persisted, including a lone token.
    fn load(&self) -> StoredTokens;

    /// Replace both tokens at once.
    fn set(&self, pair: &CredentialPair);

    /// Remove both tokens. Clearing an empty store is a no-op.
    fn clear(&self);

    /// The stored pair, if both halves are present.
    fn get(&self) -> Option<CredentialPair> {
        self.load().into_pair()
    }

    fn access_token(&self) -> Option<String> {
        self.load().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.load().refresh_token
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store. Used by tests and for sessions that should not
/// outlive the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<StoredTokens>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw values, e.g. to simulate a half-written state.
    pub fn with_tokens(tokens: StoredTokens) -> Self {
        Self {
            tokens: Mutex::new(tokens),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> StoredTokens {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, pair: &CredentialPair) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = StoredTokens::from(pair);
    }

    fn clear(&self) {
        *self.tokens.lock().unwrap_or_else(PoisonError::into_inner) = StoredTokens::default();
    }
}

// ============================================================================
// File
// ============================================================================

/// JSON document on disk. Writes go to a temp file that is renamed over the
/// real one, so the pair is replaced as a unit.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CREDENTIALS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, tokens: &StoredTokens) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> StoredTokens {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredTokens::default(),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to read credentials file");
                return StoredTokens::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to parse credentials file, treating as empty");
                StoredTokens::default()
            }
        }
    }

    fn set(&self, pair: &CredentialPair) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.write(&StoredTokens::from(pair)) {
            warn!(error = %e, path = %self.path.display(), "Failed to write credentials file");
        }
    }

    fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Credentials file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "Failed to remove credentials file"),
        }
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Stores the pair as one JSON secret in the OS keychain.
pub struct KeyringCredentialStore {
    account: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::for_account(KEYRING_ACCOUNT)
    }

    pub fn for_account(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Option<Entry> {
        match Entry::new(SERVICE_NAME, &self.account) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Failed to create keyring entry");
                None
            }
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> StoredTokens {
        let Some(entry) = self.entry() else {
            return StoredTokens::default();
        };
        match entry.get_password() {
            Ok(secret) => serde_json::from_str(&secret).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to parse keychain credentials, treating as empty");
                StoredTokens::default()
            }),
            Err(keyring::Error::NoEntry) => StoredTokens::default(),
            Err(e) => {
                warn!(error = %e, "Failed to read credentials from keychain");
                StoredTokens::default()
            }
        }
    }

    fn set(&self, pair: &CredentialPair) {
        let Some(entry) = self.entry() else { return };
        let secret = match serde_json::to_string(&StoredTokens::from(pair)) {
            Ok(secret) => secret,
            Err(e) => {
                warn!(error = %e, "Failed to serialize credentials");
                return;
            }
        };
        if let Err(e) = entry.set_password(&secret) {
            warn!(error = %e, "Failed to store credentials in keychain");
        }
    }

    fn clear(&self) {
        let Some(entry) = self.entry() else { return };
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => warn!(error = %e, "Failed to delete credentials from keychain"),
        }
    }
}
