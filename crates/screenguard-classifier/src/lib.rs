//! ScreenGuard Classifier - PII and image classification with graceful fallback.
//!
//! This crate provides the classifier capability the scan pipeline calls for
//! every text unit and image. A model-backed classifier is used when one is
//! available; otherwise, and whenever a model call fails, detection falls back
//! to deterministic pattern matching.
//!
//! # Features
//!
//! - **Provider Abstraction**: `ModelProvider` with an explicit `availability()` query
//! - **Pattern Fallback**: Regex detectors with checksum/format validation
//! - **Structured Output**: JSON-schema constrained prompts, tolerant parsing
//! - **Lazy Upgrade**: Usable in fallback mode before the model is ready
//!
//! # Example
//!
//! ```rust
//! use screenguard_classifier::{Classifier, PiiClassifier};
//! use screenguard_core::{PiiType, ScanningConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // No provider configured: pattern fallback only
//! let classifier = PiiClassifier::new(None, &ScanningConfig::default(), false);
//! classifier.initialize().await;
//!
//! let findings = classifier.detect_text("Reach me at dana@corp.io").await?;
//! assert_eq!(findings[0].kind, PiiType::Email);
//! # Ok(())
//! # }
//! ```
//!
//! # Mode Model
//!
//! ```text
//! Uninitialized ──initialize()──► Primary            (session created)
//!        │                          │ per-call parse/timeout error
//!        │                          ▼
//!        └────────────────────► Fallback(reason)   ──initialize()──► retried
//! ```
//!
//! Per-call failures never change the mode; only initialization does.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classifier;
pub mod error;
pub mod patterns;
pub mod prompts;
pub mod provider;
pub mod providers;
pub mod response;

// Re-export commonly used types
pub use classifier::{Classifier, ClassifierMode, FallbackReason, PiiClassifier};
pub use error::{ClassifierError, Result};
pub use patterns::PatternDetector;
pub use provider::{
    Availability, ModelProvider, ModelSession, PromptRequest, ProviderCapabilities,
    SessionOptions,
};
pub use providers::{from_config, OllamaProvider};
