//! Error types for page access and overlay geometry.

use crate::page::{NodeId, OverlayId};
use thiserror::Error;

/// Errors raised by the page capability and the overlay renderer.
///
/// All of them are per-unit: callers log and skip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    /// Node id was never issued by this page
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Overlay id is not (or no longer) on the page
    #[error("unknown overlay {0}")]
    UnknownOverlay(OverlayId),

    /// Operation needs a text node
    #[error("node {0} is not a text node")]
    NotText(NodeId),

    /// Char range does not fit the node's current text
    #[error("range [{start}, {end}) out of bounds for node {node} (length {len})")]
    OffsetOutOfRange {
        /// Text node
        node: NodeId,
        /// Requested start
        start: usize,
        /// Requested end
        end: usize,
        /// Current text length in chars
        len: usize,
    },

    /// Node is no longer part of the live document
    #[error("node {0} is detached from the document")]
    Detached(NodeId),

    /// A finding's literal value is not in the node's current text
    #[error("value of length {len} not found in node {node}")]
    ValueNotFound {
        /// Text node
        node: NodeId,
        /// Length of the missing value in chars
        len: usize,
    },
}

/// Result type alias for page operations.
pub type Result<T> = std::result::Result<T, PageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PageError::OffsetOutOfRange {
            node: NodeId(4),
            start: 14,
            end: 32,
            len: 31,
        };
        assert_eq!(
            err.to_string(),
            "range [14, 32) out of bounds for node #4 (length 31)"
        );

        // Values are never echoed into logs
        let err = PageError::ValueNotFound {
            node: NodeId(2),
            len: 11,
        };
        assert!(!err.to_string().contains('@'));
    }
}
