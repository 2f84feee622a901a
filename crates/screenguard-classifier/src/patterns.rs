//! Deterministic pattern-based PII detection.
//!
//! Used whenever the model-backed classifier is unavailable or a model call
//! fails. Every pattern has a validator that filters common false positives.

use once_cell::sync::Lazy;
use regex::Regex;
use screenguard_core::text::byte_to_char;
use screenguard_core::{Finding, PiiType};

/// Regex detector returning char-offset findings.
///
/// Overlapping matches are resolved by pattern priority: a credit card
/// number is never also reported as a phone number.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    patterns: Vec<PiiPattern>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    /// Create a detector with the built-in patterns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }

    /// PII types this detector can produce.
    #[must_use]
    pub fn supported_types(&self) -> Vec<PiiType> {
        self.patterns.iter().map(|p| p.pii_type).collect()
    }

    /// Scan `text` and return non-overlapping findings ordered by start offset.
    #[must_use]
    pub fn detect(&self, text: &str) -> Vec<Finding> {
        let mut candidates = Vec::new();

        for (priority, pattern) in self.patterns.iter().enumerate() {
            for captures in pattern.regex.captures_iter(text) {
                let Some(matched) = captures.get(pattern.group) else {
                    continue;
                };
                if !(pattern.validate)(matched.as_str()) {
                    continue;
                }
                candidates.push((
                    priority,
                    Finding::new(
                        pattern.pii_type,
                        matched.as_str(),
                        byte_to_char(text, matched.start()),
                        byte_to_char(text, matched.end()),
                    ),
                ));
            }
        }

        candidates.sort_by_key(|(priority, finding)| (*priority, finding.start));

        let mut accepted: Vec<Finding> = Vec::new();
        for (_, finding) in candidates {
            let overlaps = accepted
                .iter()
                .any(|a| finding.start < a.end && a.start < finding.end);
            if !overlaps {
                accepted.push(finding);
            }
        }

        accepted.sort_by_key(|f| f.start);
        accepted
    }
}

/// A PII detection pattern.
#[derive(Clone)]
struct PiiPattern {
    pii_type: PiiType,
    regex: Regex,
    /// Capture group holding the value to mask
    group: usize,
    validate: fn(&str) -> bool,
}

impl std::fmt::Debug for PiiPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiiPattern")
            .field("pii_type", &self.pii_type)
            .field("regex", &self.regex.as_str())
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// Default patterns, highest priority first.
fn default_patterns() -> Vec<PiiPattern> {
    vec![
        PiiPattern {
            pii_type: PiiType::CreditCard,
            regex: CREDIT_CARD_REGEX.clone(),
            group: 0,
            validate: is_valid_card,
        },
        PiiPattern {
            pii_type: PiiType::Ssn,
            regex: SSN_REGEX.clone(),
            group: 0,
            validate: is_valid_ssn,
        },
        PiiPattern {
            pii_type: PiiType::ApiKey,
            regex: API_KEY_REGEX.clone(),
            group: 1,
            validate: |value| value.len() >= 20,
        },
        PiiPattern {
            pii_type: PiiType::Password,
            regex: PASSWORD_REGEX.clone(),
            group: 1,
            validate: |value| !value.chars().all(|c| matches!(c, '*' | '•' | '●')),
        },
        PiiPattern {
            pii_type: PiiType::Email,
            regex: EMAIL_REGEX.clone(),
            group: 0,
            validate: |_| true,
        },
        PiiPattern {
            pii_type: PiiType::Phone,
            regex: PHONE_REGEX.clone(),
            group: 0,
            validate: is_valid_phone,
        },
    ]
}

fn digits(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn is_valid_phone(value: &str) -> bool {
    (10..=15).contains(&digits(value).len())
}

fn is_valid_ssn(value: &str) -> bool {
    let d = digits(value);
    if d.len() != 9 {
        return false;
    }
    let area = d[0] * 100 + d[1] * 10 + d[2];
    let group = d[3] * 10 + d[4];
    let serial = d[5..].iter().fold(0, |acc, x| acc * 10 + x);
    area != 0 && area != 666 && area < 900 && group != 0 && serial != 0
}

/// Luhn checksum over a 16-digit card number.
fn is_valid_card(value: &str) -> bool {
    let d = digits(value);
    if d.len() != 16 {
        return false;
    }
    let sum: u32 = d
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &digit)| {
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

// Compiled regex patterns
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")
        .expect("valid phone regex")
});

static SSN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-?\d{2}-?\d{4}\b").expect("valid SSN regex"));

static CREDIT_CARD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{4}[-\s]?){3}\d{4}\b").expect("valid credit card regex"));

static API_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:api[_-]?key|token|secret|bearer)[\s:=]+['"]?([A-Za-z0-9_\-]{20,})"#)
        .expect("valid API key regex")
});

static PASSWORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:password|passwd|pwd)\s*[:=]\s*(\S{4,})").expect("valid password regex")
});
