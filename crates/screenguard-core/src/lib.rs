//! ScreenGuard Core - Foundation crate for the on-page PII masking pipeline.
//!
//! This crate provides the shared domain types, error handling and
//! configuration management that every other ScreenGuard crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Findings, image verdicts, categories and geometry
//! - [`text`] - Char-offset helpers (findings never carry byte offsets)
//!
//! # Example
//!
//! ```rust
//! use screenguard_core::{AppConfig, Finding, PiiType};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.min_text_length, 5);
//!
//! let text = "Contact me at alice@example.com";
//! let finding = Finding::new(PiiType::Email, "alice@example.com", 14, 31);
//! assert!(finding.is_within(text));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, ClassifierConfig, ImageConfig, MonitorConfig, ScanningConfig, UserSettings,
};
pub use error::{ConfigError, ConfigResult, Result, ScreenGuardError};
pub use types::{Finding, ImageCategory, ImageVerdict, PiiType, Rect, Severity};
