//! Error types for the classifier subsystem.

use thiserror::Error;

/// Errors that can occur while classifying text or images.
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Capability missing or denied
    #[error("classifier unavailable ({provider}): {reason}")]
    Unavailable {
        /// Provider name
        provider: String,
        /// Why the capability is unavailable
        reason: String,
    },

    /// Model needs a download that is gated on a user gesture
    #[error("classifier waiting for user activation before downloading {model}")]
    AwaitingActivation {
        /// Model that would be downloaded
        model: String,
    },

    /// Structured output was malformed
    #[error("failed to parse response from {provider}: {message}")]
    Parse {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A model call exceeded its time budget
    #[error("classifier call timed out after {millis}ms")]
    Timeout {
        /// Budget in milliseconds
        millis: u64,
    },

    /// API error with status code
    #[error("API error ({provider}): status {status}, {message}")]
    ApiError {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClassifierError {
    /// Whether this error means the capability is unusable for the session,
    /// as opposed to a single failed call.
    #[must_use]
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::AwaitingActivation { .. }
        )
    }
}

/// Result type alias for classifier operations.
pub type Result<T> = std::result::Result<T, ClassifierError>;
