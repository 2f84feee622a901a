//! Parsing of structured model output.
//!
//! Models are asked for strict JSON but sometimes wrap it in markdown fences
//! or report offsets that drift from the analyzed text. Parsing is tolerant
//! of both; anything structurally wrong is a `ClassifierError::Parse`.

use crate::error::{ClassifierError, Result};
use screenguard_core::text::{find_from, locate};
use screenguard_core::{Finding, ImageCategory, ImageVerdict, PiiType};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawDetection {
    pii_found: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(rename = "unsafe", default)]
    is_unsafe: Option<bool>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    confidence: f32,
}

/// Remove a surrounding markdown code fence, if any.
#[must_use]
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) up to the first newline
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a text-detection reply into findings anchored to `text`.
///
/// Entries with an unknown type, a missing value, or a value that does not
/// occur in `text` are dropped. Offsets are re-anchored to the first
/// occurrence of the value at or after the declared start.
pub fn parse_findings(raw: &str, text: &str, provider: &str) -> Result<Vec<Finding>> {
    let detection: RawDetection =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| ClassifierError::Parse {
            provider: provider.to_string(),
            message: format!("invalid detection JSON: {e}"),
        })?;

    let mut findings: Vec<Finding> = Vec::new();
    for item in detection.pii_found {
        let Some(kind) = item
            .get("type")
            .and_then(serde_json::Value::as_str)
            .and_then(|t| t.parse::<PiiType>().ok())
        else {
            tracing::debug!("Dropping detection with unknown type: {}", item);
            continue;
        };
        let Some(value) = item
            .get("value")
            .and_then(serde_json::Value::as_str)
            .filter(|v| !v.trim().is_empty())
        else {
            continue;
        };
        let declared_start = item
            .get("start")
            .and_then(serde_json::Value::as_u64)
            .and_then(|s| usize::try_from(s).ok())
            .unwrap_or(0);

        // A repeated value claims the next occurrence not already taken
        let mut span = locate(text, value, declared_start);
        while let Some((start, end)) = span {
            let taken = findings
                .iter()
                .any(|f| f.kind == kind && f.start == start && f.end == end);
            if !taken {
                break;
            }
            span = find_from(text, value, end);
        }
        let Some((start, end)) = span else {
            tracing::debug!("Dropping {} detection with no free occurrence in text", kind);
            continue;
        };

        findings.push(Finding::new(kind, value, start, end));
    }

    findings.sort_by_key(|f| f.start);
    Ok(findings)
}

/// Parse an image-moderation reply.
pub fn parse_verdict(raw: &str, provider: &str) -> Result<ImageVerdict> {
    let verdict: RawVerdict =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| ClassifierError::Parse {
            provider: provider.to_string(),
            message: format!("invalid verdict JSON: {e}"),
        })?;

    let categories = verdict
        .categories
        .iter()
        .filter_map(|label| ImageCategory::from_label(label));

    Ok(ImageVerdict::new(
        verdict.is_unsafe,
        categories,
        verdict.confidence,
    ))
}
