//! Error types for the notify crate.

use thiserror::Error;

/// Errors that can occur while dispatching notifications.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The push service could not be reached.
    #[error("Push transport error: {0}")]
    Transport(String),

    /// The push service rejected the request.
    #[error("Push service returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The push service response could not be understood.
    #[error("Invalid push service response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] vanlink_store::StoreError),
}

impl NotifyError {
    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidResponse(_) | Self::Config(_) | Self::Store(_) => false,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A specialized Result type for notify operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
