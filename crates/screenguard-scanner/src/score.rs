//! Privacy and safety scoring.
//!
//! Both scores start at 100 and lose a weighted penalty per category with a
//! non-zero count. Repeated occurrences of a category add a diminishing
//! extra penalty capped at the category's own weight.

use crate::tracking::TrackingConcern;
use screenguard_core::{ImageCategory, PiiType};
use std::collections::BTreeMap;

/// Extra-occurrence multiplier for PII types.
pub const PII_DIMINISHING_FACTOR: f64 = 0.3;

/// Extra-occurrence multiplier for image categories.
pub const IMAGE_DIMINISHING_FACTOR: f64 = 0.4;

/// Aggregated counts for one scan pass, and the scores derived from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreEngine {
    pii_counts: BTreeMap<PiiType, u32>,
    image_counts: BTreeMap<ImageCategory, u32>,
    tracking: TrackingConcern,
}

impl ScoreEngine {
    /// Empty state: both scores are 100.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one accepted finding.
    pub fn record_finding(&mut self, kind: PiiType) {
        *self.pii_counts.entry(kind).or_insert(0) += 1;
    }

    /// Count one masked image category.
    pub fn record_image_category(&mut self, category: ImageCategory) {
        *self.image_counts.entry(category).or_insert(0) += 1;
    }

    /// Set the tracking concern reported for the page.
    pub fn set_tracking_concern(&mut self, concern: TrackingConcern) {
        self.tracking = concern;
    }

    /// Count for one PII type.
    #[must_use]
    pub fn pii_count(&self, kind: PiiType) -> u32 {
        self.pii_counts.get(&kind).copied().unwrap_or(0)
    }

    /// Counts for every PII type, zeros included.
    #[must_use]
    pub fn pii_counts(&self) -> BTreeMap<PiiType, u32> {
        PiiType::ALL
            .iter()
            .map(|kind| (*kind, self.pii_count(*kind)))
            .collect()
    }

    /// Counts for every image category, zeros included.
    #[must_use]
    pub fn image_counts(&self) -> BTreeMap<ImageCategory, u32> {
        ImageCategory::ALL
            .iter()
            .map(|c| (*c, self.image_counts.get(c).copied().unwrap_or(0)))
            .collect()
    }

    /// Total accepted PII findings.
    #[must_use]
    pub fn total_findings(&self) -> u32 {
        self.pii_counts.values().sum()
    }

    /// Privacy score in `[0, 100]`.
    #[must_use]
    pub fn compute_privacy_score(&self) -> u8 {
        let penalty: f64 = self
            .pii_counts
            .iter()
            .map(|(kind, count)| type_penalty(kind.weight(), *count, PII_DIMINISHING_FACTOR))
            .sum::<f64>()
            + f64::from(self.tracking.penalty());
        bounded(100.0 - penalty)
    }

    /// Safety score in `[0, 100]`.
    #[must_use]
    pub fn compute_safety_score(&self) -> u8 {
        let penalty: f64 = self
            .image_counts
            .iter()
            .map(|(category, count)| {
                type_penalty(category.weight(), *count, IMAGE_DIMINISHING_FACTOR)
            })
            .sum();
        bounded(100.0 - penalty)
    }
}

/// Penalty for `count` occurrences of a category weighing `weight`.
#[must_use]
pub fn type_penalty(weight: u32, count: u32, factor: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let weight = f64::from(weight);
    let extra = (f64::from(count - 1) * weight * factor).min(weight);
    weight + extra
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bounded(score: f64) -> u8 {
    score.clamp(0.0, 100.0).round() as u8
}
