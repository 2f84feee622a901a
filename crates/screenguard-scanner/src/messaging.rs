//! Contract with the control surface.
//!
//! Requests and reports use the wire shapes the popup and background
//! components exchange: snake_case message types, camelCase fields.

use crate::error::{Result, ScanError};
use crate::tracking::TrackingInfo;
use async_trait::async_trait;
use screenguard_core::{ImageCategory, PiiType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Request from the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Current flags and live counts
    GetStatus,
    /// Enable or disable scanning
    Toggle {
        /// New state
        enabled: bool,
    },
    /// Force a full pass; acknowledged when it finishes
    Rescan,
    /// Enable or disable one PII type; takes effect on the next pass
    FilterChange {
        /// Affected type
        #[serde(rename = "piiType")]
        pii_type: PiiType,
        /// New state
        enabled: bool,
    },
}

/// Live state reported for `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Scanning enabled
    pub enabled: bool,
    /// Classifier initialization finished
    pub initialized: bool,
    /// Informational classifier mode
    pub classifier_mode: String,
    /// Overlays currently drawn
    pub masked_count: usize,
    /// Accepted findings in the last completed pass
    pub count: u32,
    /// Privacy score of the last completed pass
    pub privacy_score: u8,
    /// Safety score of the last completed pass
    pub safety_score: u8,
    /// Per-type PII counts
    pub pii_counts: BTreeMap<PiiType, u32>,
    /// Per-category counts of masked images
    pub image_safety_issues: BTreeMap<ImageCategory, u32>,
}

/// Reply to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlResponse {
    /// Reply to `get_status`
    Status(StatusReport),
    /// Acknowledgement
    Ack {
        /// Whether the request was carried out
        success: bool,
    },
}

impl ControlResponse {
    /// Successful acknowledgement.
    #[must_use]
    pub fn ok() -> Self {
        Self::Ack { success: true }
    }
}

/// Message type of a [`ScanReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Published after every pass
    #[default]
    PiiDetected,
}

/// Report published after each completed scan pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Always `pii_detected`
    #[serde(rename = "type")]
    pub kind: ReportKind,
    /// Generation of the pass that produced this report
    pub generation: u64,
    /// Accepted text findings
    pub count: u32,
    /// Privacy score
    pub privacy_score: u8,
    /// Safety score
    pub safety_score: u8,
    /// Per-type PII counts
    pub pii_counts: BTreeMap<PiiType, u32>,
    /// Per-category counts of masked images
    pub image_safety_issues: BTreeMap<ImageCategory, u32>,
    /// Tracking analysis, when an analyzer is configured
    pub tracking_info: Option<TrackingInfo>,
}

/// Receiver of published reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver a report.
    async fn publish(&self, report: &ScanReport) -> Result<()>;
}

/// Sink forwarding reports to a channel.
#[derive(Debug, Clone)]
pub struct ChannelReportSink {
    tx: mpsc::UnboundedSender<ScanReport>,
}

impl ChannelReportSink {
    /// Create a sink and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScanReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReportSink for ChannelReportSink {
    async fn publish(&self, report: &ScanReport) -> Result<()> {
        self.tx
            .send(report.clone())
            .map_err(|_| ScanError::Publish("report receiver dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request: ControlRequest =
            serde_json::from_value(json!({"type": "filter_change", "piiType": "ssn", "enabled": false}))
                .unwrap();
        assert_eq!(
            request,
            ControlRequest::FilterChange {
                pii_type: PiiType::Ssn,
                enabled: false
            }
        );

        let request: ControlRequest = serde_json::from_value(json!({"type": "get_status"})).unwrap();
        assert_eq!(request, ControlRequest::GetStatus);

        let request: ControlRequest =
            serde_json::from_value(json!({"type": "toggle", "enabled": true})).unwrap();
        assert_eq!(request, ControlRequest::Toggle { enabled: true });

        assert!(serde_json::from_value::<ControlRequest>(json!({"type": "explode"})).is_err());
    }

    #[test]
    fn test_report_wire_format() {
        let report = ScanReport {
            kind: ReportKind::PiiDetected,
            generation: 1,
            count: 1,
            privacy_score: 90,
            safety_score: 100,
            pii_counts: [(PiiType::Email, 1)].into_iter().collect(),
            image_safety_issues: BTreeMap::new(),
            tracking_info: None,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["type"], "pii_detected");
        assert_eq!(json["privacyScore"], 90);
        assert_eq!(json["piiCounts"]["email"], 1);
        assert!(json["trackingInfo"].is_null());
    }

    #[test]
    fn test_ack_wire_format() {
        let json = serde_json::to_value(ControlResponse::ok()).unwrap();
        assert_eq!(json, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut rx) = ChannelReportSink::new();
        let report = ScanReport {
            kind: ReportKind::default(),
            generation: 7,
            count: 0,
            privacy_score: 100,
            safety_score: 100,
            pii_counts: BTreeMap::new(),
            image_safety_issues: BTreeMap::new(),
            tracking_info: None,
        };

        sink.publish(&report).await.unwrap();
        assert_eq!(rx.recv().await.map(|r| r.generation), Some(7));

        drop(rx);
        assert!(matches!(sink.publish(&report).await, Err(ScanError::Publish(_))));
    }
}
