//! Shared types used across the ScreenGuard pipeline.
//!
//! This module defines the closed PII and image-category sets, the
//! `Finding` and `ImageVerdict` records produced by classifiers, and the
//! screen-space `Rect` used by overlays.

use crate::error::ScreenGuardError;
use crate::text;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Types of PII the pipeline detects and masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    /// Email address
    Email,
    /// Phone number
    Phone,
    /// Social Security Number
    Ssn,
    /// Credit card number
    CreditCard,
    /// Street address
    Address,
    /// Visible password
    Password,
    /// API key, token or secret
    ApiKey,
}

impl PiiType {
    /// Every PII type, in reporting order.
    pub const ALL: [PiiType; 7] = [
        Self::Email,
        Self::Phone,
        Self::Ssn,
        Self::CreditCard,
        Self::Address,
        Self::Password,
        Self::ApiKey,
    ];

    /// Wire name of the type (`credit_card`, `api_key`, ...).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ssn => "ssn",
            Self::CreditCard => "credit_card",
            Self::Address => "address",
            Self::Password => "password",
            Self::ApiKey => "api_key",
        }
    }

    /// Base privacy-score penalty for the first occurrence of this type.
    #[must_use]
    pub fn weight(&self) -> u32 {
        match self {
            Self::Password => 25,
            Self::Ssn | Self::CreditCard => 20,
            Self::ApiKey => 15,
            Self::Email | Self::Address => 10,
            Self::Phone => 8,
        }
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PiiType {
    type Err = ScreenGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| ScreenGuardError::UnknownPiiType(s.to_string()))
    }
}

/// Categories of unsafe imagery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCategory {
    /// Violent content
    Violence,
    /// Nudity
    Nudity,
    /// Sexual or explicit content
    Sexual,
    /// Disturbing or graphic content
    Disturbing,
    /// Age-restricted content (alcohol, gambling, ...)
    AgeRestricted,
    /// Inappropriate advertising
    InappropriateAds,
}

impl ImageCategory {
    /// Every image category, in reporting order.
    pub const ALL: [ImageCategory; 6] = [
        Self::Violence,
        Self::Nudity,
        Self::Sexual,
        Self::Disturbing,
        Self::AgeRestricted,
        Self::InappropriateAds,
    ];

    /// Wire name of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Violence => "violence",
            Self::Nudity => "nudity",
            Self::Sexual => "sexual",
            Self::Disturbing => "disturbing",
            Self::AgeRestricted => "age_restricted",
            Self::InappropriateAds => "inappropriate_ads",
        }
    }

    /// Base safety-score penalty for the first occurrence of this category.
    #[must_use]
    pub fn weight(&self) -> u32 {
        match self {
            Self::Nudity | Self::Sexual => 25,
            Self::Violence | Self::AgeRestricted => 20,
            Self::Disturbing => 15,
            Self::InappropriateAds => 10,
        }
    }

    /// Map a classifier label onto a category.
    ///
    /// Accepts the canonical names plus the labels image models are
    /// prompted with (`adult_nudity`, `explicit`, `suggestive`, `graphic`).
    /// `none` and unknown labels map to `None`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "violence" | "violent" => Some(Self::Violence),
            "nudity" | "adult_nudity" => Some(Self::Nudity),
            "sexual" | "explicit" | "suggestive" => Some(Self::Sexual),
            "disturbing" | "graphic" | "gore" => Some(Self::Disturbing),
            "age_restricted" => Some(Self::AgeRestricted),
            "inappropriate_ads" | "ads" => Some(Self::InappropriateAds),
            _ => None,
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to an image verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Safe or unknown
    #[default]
    None,
    /// Mildly unsafe
    Low,
    /// Clearly unsafe
    Medium,
    /// Unsafe with high confidence in a heavy category
    High,
}

/// A single detected PII instance inside a text unit.
///
/// `start` and `end` are char offsets into the owning unit's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Type of PII
    #[serde(rename = "type")]
    pub kind: PiiType,
    /// Literal matched value
    pub value: String,
    /// Start char offset (inclusive)
    pub start: usize,
    /// End char offset (exclusive)
    pub end: usize,
}

impl Finding {
    /// Create a new finding.
    #[must_use]
    pub fn new(kind: PiiType, value: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            start,
            end,
        }
    }

    /// Whether `0 <= start < end <= len(text)` holds for `text`.
    #[must_use]
    pub fn is_within(&self, text: &str) -> bool {
        self.start < self.end && self.end <= text::char_len(text)
    }

    /// Re-anchor the offsets to the literal value inside `text`.
    ///
    /// The value is searched from the declared `start` first, then across the
    /// whole text. When the value cannot be found the declared offsets are
    /// kept only if they are in bounds.
    #[must_use]
    pub fn anchored(&self, text: &str) -> Option<Self> {
        if let Some((start, end)) = text::locate(text, &self.value, self.start) {
            return Some(Self {
                kind: self.kind,
                value: self.value.clone(),
                start,
                end,
            });
        }
        self.is_within(text).then(|| self.clone())
    }
}

/// Verdict returned by an image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVerdict {
    /// `Some(true)` unsafe, `Some(false)` safe, `None` classifier unavailable
    #[serde(rename = "unsafe")]
    pub is_unsafe: Option<bool>,
    /// Detected categories
    pub categories: BTreeSet<ImageCategory>,
    /// Classifier confidence in `[0, 1]`
    pub confidence: f32,
    /// Derived severity
    pub severity: Severity,
}

impl ImageVerdict {
    /// Build a verdict, clamping confidence and deriving severity.
    #[must_use]
    pub fn new(
        is_unsafe: Option<bool>,
        categories: impl IntoIterator<Item = ImageCategory>,
        confidence: f32,
    ) -> Self {
        let categories: BTreeSet<_> = categories.into_iter().collect();
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let severity = Self::derive_severity(is_unsafe, &categories, confidence);
        Self {
            is_unsafe,
            categories,
            confidence,
            severity,
        }
    }

    /// Verdict used when no classifier could judge the image.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(None, [], 0.0)
    }

    /// Whether the classifier produced a usable answer.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.is_unsafe.is_some()
    }

    /// Whether the image should be masked at `threshold`.
    #[must_use]
    pub fn should_mask(&self, threshold: f32) -> bool {
        self.is_unsafe == Some(true) && self.confidence >= threshold
    }

    fn derive_severity(
        is_unsafe: Option<bool>,
        categories: &BTreeSet<ImageCategory>,
        confidence: f32,
    ) -> Severity {
        if is_unsafe != Some(true) {
            return Severity::None;
        }
        let heaviest = categories.iter().map(ImageCategory::weight).max().unwrap_or(10);
        #[allow(clippy::cast_precision_loss)]
        let weighted = confidence * (heaviest as f32 / 25.0);
        if weighted >= 0.8 {
            Severity::High
        } else if weighted >= 0.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Screen-space rectangle in CSS pixels, viewport relative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rect {
    /// Left edge
    pub left: f64,
    /// Top edge
    pub top: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Whether both dimensions exceed `min` (near-zero rects are not masks).
    #[must_use]
    pub fn is_renderable(&self, min: f64) -> bool {
        self.width > min && self.height > min
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}
