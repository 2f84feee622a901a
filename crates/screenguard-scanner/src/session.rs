//! State of one scan pass.

use crate::messaging::{ReportKind, ScanReport};
use crate::score::ScoreEngine;
use crate::tracking::TrackingInfo;
use screenguard_core::{Finding, ImageVerdict};
use screenguard_page::NodeId;
use std::collections::HashSet;

/// Everything a single pass accumulates, tagged with its generation.
///
/// A session is created fresh for every pass, so counts and the processed
/// set never leak from one pass into the next.
#[derive(Debug, Clone)]
pub struct ScanSession {
    generation: u64,
    processed: HashSet<NodeId>,
    scores: ScoreEngine,
    masked_images: usize,
    tracking: Option<TrackingInfo>,
}

impl ScanSession {
    /// Start a pass.
    #[must_use]
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            processed: HashSet::new(),
            scores: ScoreEngine::new(),
            masked_images: 0,
            tracking: None,
        }
    }

    /// Generation tag of this pass.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark a unit as processed. Returns false if it already was.
    pub fn mark_processed(&mut self, node: NodeId) -> bool {
        self.processed.insert(node)
    }

    /// Whether a unit was already processed in this pass.
    #[must_use]
    pub fn is_processed(&self, node: NodeId) -> bool {
        self.processed.contains(&node)
    }

    /// Count accepted findings.
    pub fn record_findings(&mut self, findings: &[Finding]) {
        for finding in findings {
            self.scores.record_finding(finding.kind);
        }
    }

    /// Count a masked image once per category.
    pub fn record_masked_image(&mut self, verdict: &ImageVerdict) {
        self.masked_images += 1;
        for category in &verdict.categories {
            self.scores.record_image_category(*category);
        }
    }

    /// Attach the page's tracking analysis.
    pub fn set_tracking(&mut self, info: TrackingInfo) {
        self.scores.set_tracking_concern(info.privacy_concern);
        self.tracking = Some(info);
    }

    /// Images masked in this pass.
    #[must_use]
    pub fn masked_images(&self) -> usize {
        self.masked_images
    }

    /// Build the report published at the end of the pass.
    #[must_use]
    pub fn report(&self) -> ScanReport {
        ScanReport {
            kind: ReportKind::PiiDetected,
            generation: self.generation,
            count: self.scores.total_findings(),
            privacy_score: self.scores.compute_privacy_score(),
            safety_score: self.scores.compute_safety_score(),
            pii_counts: self.scores.pii_counts(),
            image_safety_issues: self.scores.image_counts(),
            tracking_info: self.tracking.clone(),
        }
    }
}
