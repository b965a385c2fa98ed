use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Classification of a single dispatched request that did not succeed.
///
/// Only `Unauthorized` drives token refresh; everything else is passed to
/// the caller as-is.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Unauthorized - access token rejected")]
    Unauthorized { body: String },

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Errors surfaced to callers of the session client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Refresh failed or the server kept rejecting a refreshed request.
    /// Local credentials are gone; the user has to log in again.
    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("{message}")]
    ValidationError { status: u16, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Failed to encode request body: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// The server's `message` field if the body carries one, else the
    /// (truncated) body, else the status reason.
    pub fn server_message(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            return parsed.message;
        }
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        } else {
            Self::truncate_body(trimmed)
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::server_message(status, body);
        match status.as_u16() {
            401 => ApiError::SessionExpired,
            404 => ApiError::NotFound(message),
            500..=599 => ApiError::ServerError {
                status: status.as_u16(),
                message,
            },
            code => ApiError::ValidationError {
                status: code,
                message,
            },
        }
    }

    /// Whether this error ended the session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

impl From<HttpError> for ApiError {
    /// A 401 that reaches a caller has already gone through recovery, so it
    /// is terminal.
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Unauthorized { .. } => ApiError::SessionExpired,
            HttpError::Status { status, body } => ApiError::from_status(status, &body),
            HttpError::Network(e) => ApiError::NetworkError(e),
        }
    }
}
