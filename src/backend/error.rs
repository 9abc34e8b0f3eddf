//! Backend failure classification

use serde_json::Value;
use std::fmt;

/// What went wrong talking to the backend, as far as the UI cares
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// Network failure or an unexpected server status
    Transport(String),
    /// Missing or rejected session; the caller should sign in again
    Unauthorized(String),
    /// The backend refused the write (constraint, validation, stale state)
    Conflict(String),
    /// The response did not have the expected shape
    Decode(String),
}

impl BackendError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = server_message(body).unwrap_or_else(|| format!("HTTP {}", status));
        match status {
            401 | 403 => BackendError::Unauthorized(message),
            400 | 409 | 422 => BackendError::Conflict(message),
            _ => BackendError::Transport(format!("HTTP {}: {}", status, message)),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(msg) => write!(f, "network error: {}", msg),
            BackendError::Unauthorized(msg) => write!(f, "not signed in: {}", msg),
            BackendError::Conflict(msg) => write!(f, "rejected: {}", msg),
            BackendError::Decode(msg) => write!(f, "unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// Pull the human-readable message out of a REST or auth error body.
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "msg", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}
