//! The host document capability.

use crate::error::Result;
use screenguard_core::{PiiType, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Class carried by every overlay node this system creates.
pub const OVERLAY_MARKER: &str = "screenguard-overlay";

/// Stable identity of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a rendered overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay-{}", self.0)
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with a lowercase tag name
    Element {
        /// Tag name
        tag: String,
    },
    /// Run of text
    Text,
}

impl NodeKind {
    /// Tag name for elements.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element { tag } => Some(tag),
            Self::Text => None,
        }
    }
}

/// What an overlay masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "type")]
pub enum OverlayKind {
    /// A PII finding inside a text node
    Pii(PiiType),
    /// An unsafe image element
    Image,
}

/// Request to draw one overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    /// Content unit the overlay belongs to
    pub owner: NodeId,
    /// What is masked
    pub kind: OverlayKind,
    /// Client-space rectangle
    pub rect: Rect,
}

/// Events observed on the page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Subtree mutation
    Mutation {
        /// Inserted nodes
        added: Vec<NodeId>,
        /// Removed nodes
        removed: Vec<NodeId>,
        /// Text nodes whose content changed
        character_data: Vec<NodeId>,
    },
    /// Viewport scrolled
    Scroll,
    /// Viewport resized
    Resize,
    /// User clicked an overlay
    OverlayActivated(OverlayId),
}

impl PageEvent {
    /// Mutation reporting inserted nodes.
    #[must_use]
    pub fn added(nodes: Vec<NodeId>) -> Self {
        Self::Mutation {
            added: nodes,
            removed: Vec::new(),
            character_data: Vec::new(),
        }
    }

    /// Mutation reporting removed nodes.
    #[must_use]
    pub fn removed(nodes: Vec<NodeId>) -> Self {
        Self::Mutation {
            added: Vec::new(),
            removed: nodes,
            character_data: Vec::new(),
        }
    }

    /// Mutation reporting a text change.
    #[must_use]
    pub fn character_data(node: NodeId) -> Self {
        Self::Mutation {
            added: Vec::new(),
            removed: Vec::new(),
            character_data: vec![node],
        }
    }
}

/// A live document with layout and an overlay surface.
///
/// Text offsets are char offsets. Rects are client-space, so they move when
/// the viewport scrolls.
pub trait Page: Send + Sync {
    /// Root of the scannable content (the body).
    fn root(&self) -> NodeId;

    /// Children in document order. Empty for unknown nodes.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Parent node, if any.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Node kind, `None` for unknown ids.
    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Whether `node` is an overlay created by this system.
    fn is_overlay(&self, node: NodeId) -> bool;

    /// Current text of a text node.
    fn text(&self, node: NodeId) -> Result<String>;

    /// Whether `node` is still connected to the root.
    fn is_attached(&self, node: NodeId) -> bool;

    /// Client rects covered by chars `[start, end)` of a text node, one per
    /// line the range spans.
    fn range_rects(&self, node: NodeId, start: usize, end: usize) -> Result<Vec<Rect>>;

    /// Client bounding box of a node.
    fn bounding_box(&self, node: NodeId) -> Result<Rect>;

    /// Image URL of an `img` element or a CSS `background-image`.
    fn image_source(&self, node: NodeId) -> Option<String>;

    /// Attribute value of an element.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Draw an overlay.
    fn insert_overlay(&self, spec: OverlaySpec) -> Result<OverlayId>;

    /// Move an existing overlay.
    fn move_overlay(&self, id: OverlayId, rect: Rect) -> Result<()>;

    /// Remove an overlay. Unknown ids are ignored.
    fn remove_overlay(&self, id: OverlayId);

    /// Show or hide the content under an overlay.
    fn set_overlay_revealed(&self, id: OverlayId, revealed: bool) -> Result<()>;

    /// Subscribe to page events.
    fn observe(&self) -> mpsc::UnboundedReceiver<PageEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_tag() {
        let kind = NodeKind::Element {
            tag: "p".to_string(),
        };
        assert_eq!(kind.tag(), Some("p"));
        assert_eq!(NodeKind::Text.tag(), None);
    }

    #[test]
    fn test_event_constructors() {
        let event = PageEvent::character_data(NodeId(3));
        assert!(matches!(
            event,
            PageEvent::Mutation { ref character_data, .. } if character_data == &[NodeId(3)]
        ));
    }
}
