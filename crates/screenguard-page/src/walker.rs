//! Enumeration of scannable content units.

use crate::page::{NodeId, NodeKind, Page};
use screenguard_core::text::char_len;
use screenguard_core::{Rect, ScanningConfig};
use std::collections::HashSet;

/// A text node selected for scanning, with its text at walk time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Text node
    pub node: NodeId,
    /// Snapshot of the node's text
    pub text: String,
}

/// An image-bearing element.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUnit {
    /// `img` element or element with a background image
    pub node: NodeId,
    /// Image URL
    pub source: String,
    /// Client bounding box at walk time
    pub rect: Rect,
}

/// Collects text units in document order.
///
/// A text node qualifies when its parent element is neither an excluded tag
/// nor an overlay, and its trimmed text has at least `min_text_length` chars.
#[derive(Debug, Clone)]
pub struct TextWalker {
    excluded_tags: HashSet<String>,
    min_text_length: usize,
}

impl TextWalker {
    /// Create a walker from scanning settings.
    #[must_use]
    pub fn new(config: &ScanningConfig) -> Self {
        Self {
            excluded_tags: config
                .excluded_tags
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
            min_text_length: config.min_text_length,
        }
    }

    /// Walk the subtree under `root`. Pure; the result is a finished list.
    #[must_use]
    pub fn collect_text_units(&self, page: &dyn Page, root: NodeId) -> Vec<TextUnit> {
        let mut units = Vec::new();
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            match page.kind(node) {
                Some(NodeKind::Text) => {
                    if !self.accepts_parent(page, node) {
                        continue;
                    }
                    let Ok(text) = page.text(node) else {
                        continue;
                    };
                    if char_len(text.trim()) >= self.min_text_length {
                        units.push(TextUnit { node, text });
                    }
                }
                Some(NodeKind::Element { .. }) => {
                    if page.is_overlay(node) {
                        continue;
                    }
                    stack.extend(page.children(node).into_iter().rev());
                }
                None => {}
            }
        }

        units
    }

    fn accepts_parent(&self, page: &dyn Page, node: NodeId) -> bool {
        let Some(parent) = page.parent(node) else {
            return false;
        };
        if page.is_overlay(parent) {
            return false;
        }
        match page.kind(parent) {
            Some(NodeKind::Element { tag }) => !self.excluded_tags.contains(&tag),
            _ => false,
        }
    }
}

/// Collect image-bearing elements under `root` in document order.
///
/// Size gating happens later; every element with an image source is listed.
#[must_use]
pub fn collect_image_units(page: &dyn Page, root: NodeId) -> Vec<ImageUnit> {
    let mut units = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if !matches!(page.kind(node), Some(NodeKind::Element { .. })) || page.is_overlay(node) {
            continue;
        }
        if let Some(source) = page.image_source(node) {
            if let Ok(rect) = page.bounding_box(node) {
                units.push(ImageUnit { node, source, rect });
            }
        }
        stack.extend(page.children(node).into_iter().rev());
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPage;
    use crate::page::{OverlayKind, OverlaySpec};

    fn walker() -> TextWalker {
        TextWalker::new(&ScanningConfig::default())
    }

    #[test]
    fn test_document_order_and_exclusions() {
        let page = MemoryPage::from_html(
            "<h1>Account details</h1>\
             <script>var email = 'x@y.zz';</script>\
             <style>.a { color: red }</style>\
             <noscript>Enable scripts please</noscript>\
             <div><span>Call 555-123-4567</span> ok</div>\
             <p>Hi</p>",
        );

        let units = walker().collect_text_units(&page, page.root());
        let texts: Vec<&str> = units.iter().map(|u| u.text.as_str()).collect();

        assert_eq!(texts, vec!["Account details", "Call 555-123-4567"]);
    }

    #[test]
    fn test_min_length_uses_trimmed_chars() {
        let page = MemoryPage::new();
        let root = page.root();
        let p = page.append_element(root, "p").unwrap();
        page.append_text(p, "   abcd   ").unwrap();
        page.append_text(p, "  éèàùç ").unwrap();

        let units = walker().collect_text_units(&page, root);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "  éèàùç ");
    }

    #[test]
    fn test_skips_overlays() {
        let page = MemoryPage::from_html("<p>Contact me at alice@example.com</p>");
        let owner = page.find_text("alice").unwrap();
        page.insert_overlay(OverlaySpec {
            owner,
            kind: OverlayKind::Image,
            rect: Rect::new(0.0, 0.0, 20.0, 20.0),
        })
        .unwrap();
        let marker = page.overlays()[0].node;
        page.append_text(marker, "Masked content here").unwrap();

        let units = walker().collect_text_units(&page, page.root());
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].node, owner);
    }

    #[test]
    fn test_walk_is_restartable() {
        let page = MemoryPage::from_html("<p>first paragraph</p><p>second paragraph</p>");
        let first = walker().collect_text_units(&page, page.root());
        let second = walker().collect_text_units(&page, page.root());
        assert_eq!(first, second);
    }

    #[test]
    fn test_collect_image_units() {
        let page = MemoryPage::from_html(
            "<img src=\"hero.jpg\" width=\"400\" height=\"300\">\
             <p>caption words</p>\
             <div style=\"background-image: url(banner.png); width: 728px; height: 90px\"></div>\
             <img>",
        );

        let units = collect_image_units(&page, page.root());
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].source, "hero.jpg");
        assert_eq!(units[1].source, "banner.png");
        assert!((units[1].rect.top - 316.0).abs() < f64::EPSILON);
    }
}
