use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Failure of a single backend request.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("failed to reach server: {0}")]
    Transport(String),
    #[error("not authenticated: {0}")]
    Unauthorized(String),
    #[error("server rejected request with status {status}: {}", .error.message)]
    Server { status: u16, error: ApiError },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Message shown to dispatch staff. Never includes transport internals.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => "The server took too long to respond. Please try again.".to_string(),
            Self::Transport(_) => {
                "Could not reach the dispatch server. Check your connection and try again."
                    .to_string()
            }
            Self::Unauthorized(_) => "Your session has expired. Please sign in again.".to_string(),
            Self::Server { error, .. } => match error.code {
                ErrorCode::Forbidden => {
                    "You do not have permission to perform this action.".to_string()
                }
                ErrorCode::RateLimited => {
                    "Too many requests. Please wait a moment and try again.".to_string()
                }
                _ => format!("The server could not complete the request: {}", error.message),
            },
            Self::Decode(_) => "The server sent an unexpected response.".to_string(),
            Self::InvalidUrl(_) => "The configured server address is not valid.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Server { status, .. } => *status >= 500 || *status == 429,
            Self::Unauthorized(_) | Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// A workflow action that is not available in the current state. The view
/// exposes these as disabled affordances; they never reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionRefused {
    #[error("select at least one pending order first")]
    EmptySelection,
    #[error("a request is already in flight")]
    RequestInFlight,
    #[error("no proposal is under review")]
    NotReviewing,
    #[error("select at least one trip to confirm")]
    NothingToConfirm,
    #[error("no confirmed trips to dismiss")]
    NotConfirmed,
}
