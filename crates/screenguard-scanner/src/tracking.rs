//! Third-party tracker detection.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use screenguard_page::{NodeId, NodeKind, Page};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Privacy concern raised by trackers on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingConcern {
    /// Nothing found
    #[default]
    None,
    /// Minor concern, no score impact
    Low,
    /// Some tracking present
    Medium,
    /// Heavy tracking
    High,
}

impl TrackingConcern {
    /// Privacy score penalty for this concern level.
    #[must_use]
    pub fn penalty(self) -> u32 {
        match self {
            Self::High => 15,
            Self::Medium => 8,
            Self::Low | Self::None => 0,
        }
    }
}

/// Tracking report published with each scan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackingInfo {
    /// Whether any tracker was found
    pub tracking_detected: bool,
    /// Human-readable summary
    pub summary: Option<String>,
    /// Kinds of data the trackers collect
    pub data_collected: Vec<String>,
    /// Overall concern
    pub privacy_concern: TrackingConcern,
}

/// Optional page-level tracking analysis.
#[async_trait]
pub trait TrackingAnalyzer: Send + Sync {
    /// Analyze the page. `None` when no analysis could be made.
    async fn analyze(&self, page: &dyn Page) -> Option<TrackingInfo>;
}

struct KnownTracker {
    host: &'static str,
    name: &'static str,
    collects: &'static [&'static str],
}

const KNOWN_TRACKERS: &[KnownTracker] = &[
    KnownTracker {
        host: "google-analytics.com",
        name: "Google Analytics",
        collects: &["browsing_activity", "device_info"],
    },
    KnownTracker {
        host: "googletagmanager.com",
        name: "Google Tag Manager",
        collects: &["browsing_activity"],
    },
    KnownTracker {
        host: "doubleclick.net",
        name: "DoubleClick",
        collects: &["advertising_profile", "browsing_activity"],
    },
    KnownTracker {
        host: "connect.facebook.net",
        name: "Meta Pixel",
        collects: &["advertising_profile", "social_identity"],
    },
    KnownTracker {
        host: "hotjar.com",
        name: "Hotjar",
        collects: &["session_recording", "device_info"],
    },
    KnownTracker {
        host: "segment.com",
        name: "Segment",
        collects: &["identity", "browsing_activity"],
    },
    KnownTracker {
        host: "mixpanel.com",
        name: "Mixpanel",
        collects: &["product_usage", "device_info"],
    },
    KnownTracker {
        host: "scorecardresearch.com",
        name: "Comscore",
        collects: &["browsing_activity"],
    },
];

const SOURCE_TAGS: [&str; 3] = ["script", "iframe", "img"];

static HOST_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9+.-]*:)?//([^/?#:@]+)").expect("valid host regex")
});

/// Matches script, iframe and pixel sources against well-known tracker hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownTrackerAnalyzer;

impl KnownTrackerAnalyzer {
    /// Create the analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn sources(page: &dyn Page) -> Vec<String> {
        let mut sources = Vec::new();
        let mut stack: Vec<NodeId> = vec![page.root()];
        while let Some(node) = stack.pop() {
            let Some(NodeKind::Element { tag }) = page.kind(node) else {
                continue;
            };
            if page.is_overlay(node) {
                continue;
            }
            if SOURCE_TAGS.contains(&tag.as_str()) {
                if let Some(src) = page.attribute(node, "src") {
                    sources.push(src);
                }
            }
            stack.extend(page.children(node).into_iter().rev());
        }
        sources
    }

    fn match_tracker(source: &str) -> Option<&'static KnownTracker> {
        let host = HOST_REGEX.captures(source.trim())?.get(1)?.as_str().to_ascii_lowercase();
        KNOWN_TRACKERS.iter().find(|tracker| {
            host == tracker.host || host.ends_with(&format!(".{}", tracker.host))
        })
    }
}

#[async_trait]
impl TrackingAnalyzer for KnownTrackerAnalyzer {
    async fn analyze(&self, page: &dyn Page) -> Option<TrackingInfo> {
        let mut names = BTreeSet::new();
        let mut collected = BTreeSet::new();
        for source in Self::sources(page) {
            if let Some(tracker) = Self::match_tracker(&source) {
                names.insert(tracker.name);
                collected.extend(tracker.collects.iter().map(|c| (*c).to_string()));
            }
        }

        let privacy_concern = match names.len() {
            0 => TrackingConcern::None,
            1 | 2 => TrackingConcern::Medium,
            _ => TrackingConcern::High,
        };
        let summary = (!names.is_empty()).then(|| {
            let list: Vec<&str> = names.iter().copied().collect();
            format!("{} tracker(s) detected: {}", list.len(), list.join(", "))
        });

        tracing::debug!("Tracking analysis: {:?}", privacy_concern);
        Some(TrackingInfo {
            tracking_detected: !names.is_empty(),
            summary,
            data_collected: collected.into_iter().collect(),
            privacy_concern,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenguard_page::MemoryPage;

    #[test]
    fn test_match_tracker_host() {
        let matched = KnownTrackerAnalyzer::match_tracker(
            "https://www.google-analytics.com/analytics.js",
        );
        assert_eq!(matched.map(|t| t.name), Some("Google Analytics"));

        let protocol_relative = KnownTrackerAnalyzer::match_tracker("//static.hotjar.com/c/hotjar.js");
        assert_eq!(protocol_relative.map(|t| t.name), Some("Hotjar"));

        assert!(KnownTrackerAnalyzer::match_tracker("https://notgoogle-analytics.com/x.js").is_none());
        assert!(KnownTrackerAnalyzer::match_tracker("/js/app.js").is_none());
    }

    #[tokio::test]
    async fn test_clean_page() {
        let page = MemoryPage::from_html("<p>Nothing to see</p><script src=\"/app.js\"></script>");
        let info = KnownTrackerAnalyzer::new().analyze(&page).await.unwrap();

        assert!(!info.tracking_detected);
        assert_eq!(info.privacy_concern, TrackingConcern::None);
        assert!(info.summary.is_none());
    }

    #[tokio::test]
    async fn test_concern_levels() {
        let page = MemoryPage::from_html(
            "<p>Welcome back</p>\
             <script src=\"https://www.googletagmanager.com/gtm.js\"></script>",
        );
        let info = KnownTrackerAnalyzer::new().analyze(&page).await.unwrap();
        assert!(info.tracking_detected);
        assert_eq!(info.privacy_concern, TrackingConcern::Medium);

        let page = MemoryPage::from_html(
            "<p>Welcome back</p>\
             <script src=\"https://www.googletagmanager.com/gtm.js\"></script>\
             <script src=\"https://connect.facebook.net/en_US/fbevents.js\"></script>\
             <img src=\"https://sb.scorecardresearch.com/p?c1=2\" width=\"1\" height=\"1\">",
        );
        let info = KnownTrackerAnalyzer::new().analyze(&page).await.unwrap();
        assert_eq!(info.privacy_concern, TrackingConcern::High);
        assert!(info.data_collected.contains(&"advertising_profile".to_string()));
        assert_eq!(
            info.summary.as_deref(),
            Some("3 tracker(s) detected: Comscore, Google Tag Manager, Meta Pixel")
        );
    }

    #[test]
    fn test_tracking_info_wire_format() {
        let info = TrackingInfo {
            tracking_detected: true,
            summary: None,
            data_collected: vec!["device_info".to_string()],
            privacy_concern: TrackingConcern::High,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["privacy_concern"], "high");
        assert_eq!(json["tracking_detected"], true);
    }
}
