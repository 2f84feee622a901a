//! ScreenGuard Scanner - Scan pass orchestration over a live page.
//!
//! This crate drives the detection-to-overlay pipeline: it walks the page,
//! classifies each content unit, hands accepted findings to the finding
//! store, scores the result and publishes it to the control surface.
//!
//! # Features
//!
//! - **Generation-tagged passes**: results of a superseded pass are discarded
//! - **Image moderation**: size gating, concurrent fetch, SHA-256 verdict cache
//! - **Scoring**: weighted, diminishing-return privacy and safety scores
//! - **Tracking analysis**: optional analyzer feeding the privacy score
//! - **Runtime**: consumes monitor actions and control requests
//!
//! # Example
//!
//! ```rust
//! use screenguard_classifier::PiiClassifier;
//! use screenguard_core::AppConfig;
//! use screenguard_page::MemoryPage;
//! use screenguard_scanner::{ChannelReportSink, ScanController};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let page = Arc::new(MemoryPage::from_html("<p>Contact me at alice@example.com</p>"));
//! let classifier = Arc::new(PiiClassifier::new(None, &config.scanning, false));
//! let (sink, _reports) = ChannelReportSink::new();
//!
//! let controller = ScanController::new(page, classifier, &config, Arc::new(sink))?;
//! controller.initialize().await;
//! let report = controller.run_scan().await?.expect("scanning enabled");
//! assert_eq!(report.privacy_score, 90);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod controller;
pub mod error;
pub mod images;
pub mod messaging;
pub mod runtime;
pub mod score;
pub mod session;
pub mod tracking;

// Re-export commonly used types
pub use controller::{accept_findings, ScanController, ScanPhase};
pub use error::{Result, ScanError};
pub use images::{content_hash, HttpImageFetcher, ImageFetcher, ImagePipeline, VerdictCache};
pub use messaging::{
    ChannelReportSink, ControlRequest, ControlResponse, ReportKind, ReportSink, ScanReport,
    StatusReport,
};
pub use runtime::{control_channel, ControlHandle, ControlMessage, Runtime};
pub use score::ScoreEngine;
pub use session::ScanSession;
pub use tracking::{KnownTrackerAnalyzer, TrackingAnalyzer, TrackingConcern, TrackingInfo};
