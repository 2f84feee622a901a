//! Core error types for ScreenGuard.
//!
//! Subsystem crates define their own error enums; this module holds the
//! shared top-level error and the configuration errors.

use thiserror::Error;

/// Central error type for ScreenGuard operations.
#[derive(Error, Debug)]
pub enum ScreenGuardError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A PII type name outside the closed set
    #[error("unknown PII type: {0}")]
    UnknownPiiType(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The platform has no config directory
    #[error("no platform config directory available")]
    NoConfigDir,

    /// No file at the given path
    #[error("no config file at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `ScreenGuardError`.
pub type Result<T> = std::result::Result<T, ScreenGuardError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
