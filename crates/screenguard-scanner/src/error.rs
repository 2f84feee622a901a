//! Error types for scan orchestration.

use thiserror::Error;

/// Errors raised while running a scan pass.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Image bytes could not be fetched
    #[error("Failed to fetch image {url}: {reason}")]
    Fetch {
        /// Image URL
        url: String,
        /// Failure description
        reason: String,
    },

    /// A newer scan pass started while this one was awaiting results
    #[error("Scan generation {generation} superseded by {current}")]
    StaleGeneration {
        /// Generation of the discarded pass
        generation: u64,
        /// Generation now current
        current: u64,
    },

    /// The report could not be delivered
    #[error("Failed to publish report: {0}")]
    Publish(String),

    /// The runtime is no longer accepting requests
    #[error("Runtime stopped")]
    RuntimeStopped,

    /// Classifier error
    #[error("Classifier error: {0}")]
    Classifier(#[from] screenguard_classifier::ClassifierError),

    /// Page error
    #[error("Page error: {0}")]
    Page(#[from] screenguard_page::PageError),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanError {
    /// Whether this error only means the pass was superseded.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleGeneration { .. })
    }
}

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, ScanError>;
