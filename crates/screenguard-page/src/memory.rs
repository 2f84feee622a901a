//! In-memory page with a deterministic layout model.
//!
//! Layout is a single column of blocks. Every text node starts a new block
//! and wraps at the viewport width with a fixed glyph advance; elements with
//! an explicit `width`/`height` occupy a block of that size before their
//! children. Overlays are absolutely positioned and take no space.

use crate::error::{PageError, Result};
use crate::page::{
    NodeId, NodeKind, OverlayId, OverlayKind, OverlaySpec, Page, PageEvent, OVERLAY_MARKER,
};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use screenguard_core::text::char_len;
use screenguard_core::Rect;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Horizontal advance of one char, in px.
pub const GLYPH_WIDTH: f64 = 8.0;

/// Height of one line box, in px.
pub const LINE_HEIGHT: f64 = 16.0;

const DEFAULT_VIEWPORT_WIDTH: f64 = 1024.0;
const DEFAULT_VIEWPORT_HEIGHT: f64 = 768.0;

/// Overlay marker nodes are numbered from here, apart from content nodes.
const MARKER_ID_BASE: u64 = 1 << 63;

static BACKGROUND_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"background(?:-image)?\s*:[^;]*url\(\s*['"]?([^'")]+?)['"]?\s*\)"#)
        .expect("valid background url regex")
});

static STYLE_SIZE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|;)\s*(width|height)\s*:\s*([0-9.]+)px").expect("valid style size regex")
});

/// Point-in-time view of a rendered overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySnapshot {
    /// Overlay id
    pub id: OverlayId,
    /// Marker node inserted into the document
    pub node: NodeId,
    /// Content unit the overlay masks
    pub owner: NodeId,
    /// What is masked
    pub kind: OverlayKind,
    /// Current client rect
    pub rect: Rect,
    /// Whether the content is currently revealed
    pub revealed: bool,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: String,
    attributes: BTreeMap<String, String>,
}

impl NodeData {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            parent: None,
            children: Vec::new(),
            text: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    fn text(content: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            parent: None,
            children: Vec::new(),
            text: content.into(),
            attributes: BTreeMap::new(),
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.attributes
            .get("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn is_hidden(&self) -> bool {
        self.attributes.contains_key("hidden")
            || self.attributes.get("style").is_some_and(|style| {
                style
                    .replace(' ', "")
                    .to_ascii_lowercase()
                    .contains("display:none")
            })
    }

    /// Size from `width`/`height` attributes, falling back to inline style.
    fn explicit_size(&self) -> Option<(f64, f64)> {
        let mut width = self.attributes.get("width").and_then(|w| parse_px(w));
        let mut height = self.attributes.get("height").and_then(|h| parse_px(h));

        if let Some(style) = self.attributes.get("style") {
            for caps in STYLE_SIZE_REGEX.captures_iter(style) {
                let value = caps[2].parse::<f64>().ok();
                match &caps[1] {
                    "width" => width = width.or(value),
                    _ => height = height.or(value),
                }
            }
        }

        Some((width?, height?))
    }
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok()
}

#[derive(Debug)]
struct OverlayRecord {
    node: NodeId,
    spec: OverlaySpec,
    revealed: bool,
}

#[derive(Debug, Default)]
struct Layout {
    /// Document-space top of each laid out text node
    text_tops: HashMap<NodeId, f64>,
    /// Document-space boxes of text nodes and sized or parent elements
    boxes: HashMap<NodeId, Rect>,
}

#[derive(Debug)]
struct Inner {
    nodes: HashMap<NodeId, NodeData>,
    root: NodeId,
    next_node: u64,
    next_marker: u64,
    layout: Option<Layout>,
    overlays: BTreeMap<OverlayId, OverlayRecord>,
    next_overlay: u64,
    viewport_width: f64,
    viewport_height: f64,
    scroll_x: f64,
    scroll_y: f64,
    observers: Vec<mpsc::UnboundedSender<PageEvent>>,
}

impl Inner {
    fn new(width: f64, height: f64) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeData::element("body"));
        Self {
            nodes,
            root,
            next_node: 1,
            next_marker: 0,
            layout: None,
            overlays: BTreeMap::new(),
            next_overlay: 1,
            viewport_width: width,
            viewport_height: height,
            scroll_x: 0.0,
            scroll_y: 0.0,
            observers: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(&id).ok_or_else(|| {
            if self.was_allocated(id) {
                PageError::Detached(id)
            } else {
                PageError::UnknownNode(id)
            }
        })
    }

    /// Whether `id` was handed out, even if the node has since been freed.
    fn was_allocated(&self, id: NodeId) -> bool {
        if id.0 >= MARKER_ID_BASE {
            id.0 - MARKER_ID_BASE < self.next_marker
        } else {
            id.0 < self.next_node
        }
    }

    fn alloc(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.link(id, parent, data);
        id
    }

    fn alloc_marker(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(MARKER_ID_BASE + self.next_marker);
        self.next_marker += 1;
        self.link(id, parent, data);
        id
    }

    fn link(&mut self, id: NodeId, parent: NodeId, mut data: NodeData) {
        data.parent = Some(parent);
        self.nodes.insert(id, data);
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(id);
        }
        self.layout = None;
    }

    fn append(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId> {
        self.node(parent)?;
        let id = self.alloc(parent, data);
        if self.is_attached(parent) {
            self.emit(&PageEvent::added(vec![id]));
        }
        Ok(id)
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.nodes.get_mut(&id).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        self.layout = None;
    }

    /// Drop a detached subtree from the arena.
    fn free(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(data) = self.nodes.remove(&id) {
                pending.extend(data.children);
            }
        }
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.nodes.get(&node).and_then(|n| n.parent);
        }
        false
    }

    fn is_overlay(&self, id: NodeId) -> bool {
        // Marker ids stay recognizable after the marker is freed
        if id.0 >= MARKER_ID_BASE {
            return true;
        }
        let mut current = Some(id);
        while let Some(node) = current {
            let Some(data) = self.nodes.get(&node) else {
                return false;
            };
            if data.has_class(OVERLAY_MARKER) {
                return true;
            }
            current = data.parent;
        }
        false
    }

    fn chars_per_line(&self) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let chars = (self.viewport_width / GLYPH_WIDTH).floor() as usize;
        chars.max(1)
    }

    /// Layout of the whole document, recomputed only after a change that
    /// can move content.
    fn layout(&mut self) -> &Layout {
        if self.layout.is_none() {
            let mut layout = Layout::default();
            let mut cursor = 0.0;
            self.layout_node(self.root, self.chars_per_line(), &mut cursor, &mut layout);
            self.layout = Some(layout);
        }
        self.layout.get_or_insert_with(Layout::default)
    }

    #[allow(clippy::cast_precision_loss)]
    fn layout_node(&self, id: NodeId, per_line: usize, cursor: &mut f64, out: &mut Layout) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };

        match node.kind {
            NodeKind::Text => {
                let len = char_len(&node.text);
                if len == 0 {
                    return;
                }
                let lines = len.div_ceil(per_line);
                let width = len.min(per_line) as f64 * GLYPH_WIDTH;
                let height = lines as f64 * LINE_HEIGHT;
                out.text_tops.insert(id, *cursor);
                out.boxes.insert(id, Rect::new(0.0, *cursor, width, height));
                *cursor += height;
            }
            NodeKind::Element { .. } => {
                if node.has_class(OVERLAY_MARKER) || node.is_hidden() {
                    return;
                }
                if let Some((width, height)) = node.explicit_size() {
                    out.boxes.insert(id, Rect::new(0.0, *cursor, width, height));
                    *cursor += height;
                }
                for child in &node.children {
                    self.layout_node(*child, per_line, cursor, out);
                }
                if !out.boxes.contains_key(&id) {
                    let union = node
                        .children
                        .iter()
                        .filter_map(|c| out.boxes.get(c))
                        .copied()
                        .reduce(|a, b| {
                            let left = a.left.min(b.left);
                            let top = a.top.min(b.top);
                            Rect::new(
                                left,
                                top,
                                a.right().max(b.right()) - left,
                                a.bottom().max(b.bottom()) - top,
                            )
                        });
                    if let Some(rect) = union {
                        out.boxes.insert(id, rect);
                    }
                }
            }
        }
    }

    fn to_client(&self, rect: Rect) -> Rect {
        Rect::new(
            rect.left - self.scroll_x,
            rect.top - self.scroll_y,
            rect.width,
            rect.height,
        )
    }

    fn emit(&mut self, event: &PageEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn import_children(&mut self, parent: NodeId, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                let mut data = NodeData::element(child_element.value().name());
                for (name, value) in child_element.value().attrs() {
                    data.attributes
                        .insert(name.to_ascii_lowercase(), value.to_string());
                }
                let id = self.alloc(parent, data);
                self.import_children(id, child_element);
            } else if let Some(text) = child.value().as_text() {
                let content: &str = text;
                if !content.trim().is_empty() {
                    self.alloc(parent, NodeData::text(content));
                }
            }
        }
    }
}

/// Deterministic in-memory [`Page`].
#[derive(Debug)]
pub struct MemoryPage {
    inner: Mutex<Inner>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    /// Empty page with a 1024x768 viewport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_viewport(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
    }

    /// Empty page with a custom viewport.
    #[must_use]
    pub fn with_viewport(width: f64, height: f64) -> Self {
        Self {
            inner: Mutex::new(Inner::new(width, height)),
        }
    }

    /// Import the `<body>` of an HTML document.
    ///
    /// Whitespace-only text nodes are dropped.
    #[must_use]
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);
        let page = Self::new();
        {
            let mut inner = page.lock();
            let root = inner.root;
            let body = document
                .root_element()
                .children()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "body");
            if let Some(body) = body {
                inner.import_children(root, body);
            }
        }
        page
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an element under `parent`.
    pub fn append_element(&self, parent: NodeId, tag: &str) -> Result<NodeId> {
        self.lock().append(parent, NodeData::element(tag))
    }

    /// Append a text node under `parent`.
    pub fn append_text(&self, parent: NodeId, text: &str) -> Result<NodeId> {
        self.lock().append(parent, NodeData::text(text))
    }

    /// Set an element attribute. Attribute changes are not observed.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let mut inner = self.lock();
        let data = inner
            .nodes
            .get_mut(&node)
            .ok_or(PageError::UnknownNode(node))?;
        data.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        inner.layout = None;
        Ok(())
    }

    /// Replace the content of a text node.
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<()> {
        let mut inner = self.lock();
        let data = inner
            .nodes
            .get_mut(&node)
            .ok_or(PageError::UnknownNode(node))?;
        if !matches!(data.kind, NodeKind::Text) {
            return Err(PageError::NotText(node));
        }
        data.text = text.to_string();
        inner.layout = None;
        if inner.is_attached(node) {
            inner.emit(&PageEvent::character_data(node));
        }
        Ok(())
    }

    /// Remove a node and its subtree from the document.
    ///
    /// Removed ids answer [`PageError::Detached`] from then on.
    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        let mut inner = self.lock();
        inner.node(node)?;
        if node == inner.root {
            return Err(PageError::Detached(node));
        }
        let was_attached = inner.is_attached(node);
        inner.detach(node);
        inner.free(node);
        if was_attached {
            inner.emit(&PageEvent::removed(vec![node]));
        }
        Ok(())
    }

    /// Scroll the viewport to an absolute offset.
    pub fn scroll_to(&self, x: f64, y: f64) {
        let mut inner = self.lock();
        inner.scroll_x = x;
        inner.scroll_y = y;
        inner.emit(&PageEvent::Scroll);
    }

    /// Resize the viewport. Text rewraps.
    pub fn resize(&self, width: f64, height: f64) {
        let mut inner = self.lock();
        inner.viewport_width = width;
        inner.viewport_height = height;
        inner.layout = None;
        inner.emit(&PageEvent::Resize);
    }

    /// Current viewport size.
    #[must_use]
    pub fn viewport(&self) -> (f64, f64) {
        let inner = self.lock();
        (inner.viewport_width, inner.viewport_height)
    }

    /// Simulate a user click on an overlay.
    pub fn activate_overlay(&self, id: OverlayId) -> Result<()> {
        let mut inner = self.lock();
        if !inner.overlays.contains_key(&id) {
            return Err(PageError::UnknownOverlay(id));
        }
        inner.emit(&PageEvent::OverlayActivated(id));
        Ok(())
    }

    /// Snapshot of every overlay currently on the page.
    #[must_use]
    pub fn overlays(&self) -> Vec<OverlaySnapshot> {
        self.lock()
            .overlays
            .iter()
            .map(|(id, record)| OverlaySnapshot {
                id: *id,
                node: record.node,
                owner: record.spec.owner,
                kind: record.spec.kind,
                rect: record.spec.rect,
                revealed: record.revealed,
            })
            .collect()
    }

    /// Number of overlays on the page.
    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.lock().overlays.len()
    }

    /// Nodes held by the page, overlay markers included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// First attached text node containing `needle`, in document order.
    #[must_use]
    pub fn find_text(&self, needle: &str) -> Option<NodeId> {
        let inner = self.lock();
        let mut stack = vec![inner.root];
        while let Some(id) = stack.pop() {
            let Some(data) = inner.nodes.get(&id) else {
                continue;
            };
            if matches!(data.kind, NodeKind::Text) && data.text.contains(needle) {
                return Some(id);
            }
            stack.extend(data.children.iter().rev());
        }
        None
    }

    /// Attached elements with `tag`, in document order.
    #[must_use]
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let inner = self.lock();
        let mut found = Vec::new();
        let mut stack = vec![inner.root];
        while let Some(id) = stack.pop() {
            let Some(data) = inner.nodes.get(&id) else {
                continue;
            };
            if data.kind.tag().is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
                found.push(id);
            }
            stack.extend(data.children.iter().rev());
        }
        found
    }
}

impl Page for MemoryPage {
    fn root(&self) -> NodeId {
        self.lock().root
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.lock().nodes.get(&node).map(|n| n.kind.clone())
    }

    fn is_overlay(&self, node: NodeId) -> bool {
        self.lock().is_overlay(node)
    }

    fn text(&self, node: NodeId) -> Result<String> {
        let inner = self.lock();
        let data = inner.node(node)?;
        match data.kind {
            NodeKind::Text => Ok(data.text.clone()),
            NodeKind::Element { .. } => Err(PageError::NotText(node)),
        }
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.lock().is_attached(node)
    }

    #[allow(clippy::cast_precision_loss)]
    fn range_rects(&self, node: NodeId, start: usize, end: usize) -> Result<Vec<Rect>> {
        let mut inner = self.lock();
        let data = inner.node(node)?;
        if !matches!(data.kind, NodeKind::Text) {
            return Err(PageError::NotText(node));
        }
        let len = char_len(&data.text);
        if !inner.is_attached(node) {
            return Err(PageError::Detached(node));
        }
        if start >= end || end > len {
            return Err(PageError::OffsetOutOfRange {
                node,
                start,
                end,
                len,
            });
        }

        // Hidden text has no geometry
        let Some(top) = inner.layout().text_tops.get(&node).copied() else {
            return Ok(Vec::new());
        };

        let per_line = inner.chars_per_line();
        let rects = (start / per_line..=(end - 1) / per_line)
            .map(|line| {
                let line_start = line * per_line;
                let from = start.max(line_start);
                let to = end.min(line_start + per_line);
                inner.to_client(Rect::new(
                    (from - line_start) as f64 * GLYPH_WIDTH,
                    top + line as f64 * LINE_HEIGHT,
                    (to - from) as f64 * GLYPH_WIDTH,
                    LINE_HEIGHT,
                ))
            })
            .collect();
        Ok(rects)
    }

    fn bounding_box(&self, node: NodeId) -> Result<Rect> {
        let mut inner = self.lock();
        inner.node(node)?;
        if !inner.is_attached(node) {
            return Err(PageError::Detached(node));
        }
        let rect = inner.layout().boxes.get(&node).copied();
        Ok(rect.map(|rect| inner.to_client(rect)).unwrap_or_default())
    }

    fn image_source(&self, node: NodeId) -> Option<String> {
        let inner = self.lock();
        let data = inner.nodes.get(&node)?;
        if data.kind.tag() == Some("img") {
            return data
                .attributes
                .get("src")
                .filter(|src| !src.trim().is_empty())
                .cloned();
        }
        let style = data.attributes.get("style")?;
        BACKGROUND_URL_REGEX
            .captures(style)
            .map(|caps| caps[1].trim().to_string())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.lock()
            .nodes
            .get(&node)?
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    fn insert_overlay(&self, spec: OverlaySpec) -> Result<OverlayId> {
        let mut inner = self.lock();
        inner.node(spec.owner)?;

        let mut marker = NodeData::element("div");
        marker
            .attributes
            .insert("class".to_string(), OVERLAY_MARKER.to_string());
        let root = inner.root;
        let node = inner.alloc_marker(root, marker);

        let id = OverlayId(inner.next_overlay);
        inner.next_overlay += 1;
        inner.overlays.insert(
            id,
            OverlayRecord {
                node,
                spec,
                revealed: false,
            },
        );
        inner.emit(&PageEvent::added(vec![node]));
        Ok(id)
    }

    fn move_overlay(&self, id: OverlayId, rect: Rect) -> Result<()> {
        let mut inner = self.lock();
        let record = inner
            .overlays
            .get_mut(&id)
            .ok_or(PageError::UnknownOverlay(id))?;
        record.spec.rect = rect;
        Ok(())
    }

    fn remove_overlay(&self, id: OverlayId) {
        let mut inner = self.lock();
        if let Some(record) = inner.overlays.remove(&id) {
            inner.detach(record.node);
            inner.free(record.node);
            inner.emit(&PageEvent::removed(vec![record.node]));
        }
    }

    fn set_overlay_revealed(&self, id: OverlayId, revealed: bool) -> Result<()> {
        let mut inner = self.lock();
        let record = inner
            .overlays
            .get_mut(&id)
            .ok_or(PageError::UnknownOverlay(id))?;
        record.revealed = revealed;
        Ok(())
    }

    fn observe(&self) -> mpsc::UnboundedReceiver<PageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().observers.push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenguard_core::PiiType;

    #[test]
    fn test_from_html_structure() {
        let page = MemoryPage::from_html(
            "<html><head><title>Ignored</title></head>\
             <body><p>Hello <b>world</b></p>\n  <img src=\"a.png\" width=\"100\" height=\"80\"></body></html>",
        );
        let root = page.root();
        let children = page.children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(page.kind(children[0]).and_then(|k| k.tag().map(String::from)), Some("p".to_string()));
        assert_eq!(page.image_source(children[1]), Some("a.png".to_string()));
        assert!(page.find_text("Ignored").is_none());
        assert!(page.find_text("world").is_some());
    }

    #[test]
    fn test_range_rects_single_line() {
        let page = MemoryPage::from_html("<p>Contact me at alice@example.com</p>");
        let node = page.find_text("alice").unwrap();

        let rects = page.range_rects(node, 14, 31).unwrap();
        assert_eq!(rects, vec![Rect::new(112.0, 0.0, 136.0, 16.0)]);
    }

    #[test]
    fn test_range_rects_wraps_across_lines() {
        // 10 chars per line
        let page = MemoryPage::with_viewport(80.0, 200.0);
        let root = page.root();
        let node = page.append_text(root, "abcdefghijklmnopqrstuvwxyz").unwrap();

        let rects = page.range_rects(node, 8, 13).unwrap();
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0], Rect::new(64.0, 0.0, 16.0, 16.0));
        assert_eq!(rects[1], Rect::new(0.0, 16.0, 24.0, 16.0));
    }

    #[test]
    fn test_range_rects_rejects_bad_ranges() {
        let page = MemoryPage::from_html("<p>short text</p>");
        let node = page.find_text("short").unwrap();

        assert!(matches!(
            page.range_rects(node, 3, 40),
            Err(PageError::OffsetOutOfRange { len: 10, .. })
        ));
        assert!(matches!(
            page.range_rects(node, 4, 4),
            Err(PageError::OffsetOutOfRange { .. })
        ));
        assert!(matches!(
            page.range_rects(page.root(), 0, 1),
            Err(PageError::NotText(_))
        ));
    }

    #[test]
    fn test_scroll_moves_client_rects() {
        let page = MemoryPage::from_html("<p>first line</p><p>second line</p>");
        let node = page.find_text("second").unwrap();

        let before = page.range_rects(node, 0, 6).unwrap()[0];
        page.scroll_to(0.0, 10.0);
        let after = page.range_rects(node, 0, 6).unwrap()[0];

        assert!((before.top - 16.0).abs() < f64::EPSILON);
        assert!((after.top - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hidden_text_has_no_geometry() {
        let page = MemoryPage::from_html("<div style=\"display: none\"><p>secret words</p></div>");
        let node = page.find_text("secret").unwrap();
        assert!(page.range_rects(node, 0, 6).unwrap().is_empty());
    }

    #[test]
    fn test_bounding_box_and_background_image() {
        let page = MemoryPage::from_html(
            "<p>caption text</p>\
             <div style=\"background-image: url('ad.jpg'); width: 300px; height: 250px\"></div>",
        );
        let div = page.elements_by_tag("div")[0];

        assert_eq!(page.image_source(div), Some("ad.jpg".to_string()));
        assert_eq!(
            page.bounding_box(div).unwrap(),
            Rect::new(0.0, 16.0, 300.0, 250.0)
        );
    }

    #[tokio::test]
    async fn test_overlay_lifecycle_emits_mutations() {
        let page = MemoryPage::from_html("<p>Contact me at alice@example.com</p>");
        let owner = page.find_text("alice").unwrap();
        let mut events = page.observe();

        let id = page
            .insert_overlay(OverlaySpec {
                owner,
                kind: OverlayKind::Pii(PiiType::Email),
                rect: Rect::new(112.0, 0.0, 136.0, 16.0),
            })
            .unwrap();
        let marker = page.overlays()[0].node;
        assert!(page.is_overlay(marker));
        assert_eq!(events.recv().await, Some(PageEvent::added(vec![marker])));

        page.remove_overlay(id);
        assert_eq!(page.overlay_count(), 0);
        assert!(page.is_overlay(marker));
        assert_eq!(events.recv().await, Some(PageEvent::removed(vec![marker])));
    }

    #[tokio::test]
    async fn test_text_mutation_events() {
        let page = MemoryPage::from_html("<p>hello there</p>");
        let node = page.find_text("hello").unwrap();
        let mut events = page.observe();

        page.set_text(node, "goodbye there").unwrap();
        assert_eq!(events.recv().await, Some(PageEvent::character_data(node)));

        page.remove_node(node).unwrap();
        assert!(!page.is_attached(node));
        assert_eq!(events.recv().await, Some(PageEvent::removed(vec![node])));
        assert!(matches!(page.range_rects(node, 0, 3), Err(PageError::Detached(_))));
    }

    #[test]
    fn test_overlays_take_no_layout_space() {
        let page = MemoryPage::from_html("<p>one line</p><p>two line</p>");
        let second = page.find_text("two").unwrap();
        let before = page.range_rects(second, 0, 3).unwrap();

        page.insert_overlay(OverlaySpec {
            owner: second,
            kind: OverlayKind::Image,
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
        })
        .unwrap();

        assert_eq!(page.range_rects(second, 0, 3).unwrap(), before);
    }

    #[test]
    fn test_removed_overlays_free_their_markers() {
        let page = MemoryPage::from_html("<p>Contact me at alice@example.com</p>");
        let owner = page.find_text("alice").unwrap();
        let baseline = page.node_count();

        let mut last_marker = None;
        for _ in 0..500 {
            let id = page
                .insert_overlay(OverlaySpec {
                    owner,
                    kind: OverlayKind::Pii(PiiType::Email),
                    rect: Rect::new(112.0, 0.0, 136.0, 16.0),
                })
                .unwrap();
            last_marker = Some(page.overlays()[0].node);
            page.remove_overlay(id);
        }

        assert_eq!(page.node_count(), baseline);
        let marker = last_marker.unwrap();
        assert!(page.is_overlay(marker));
        assert!(!page.is_attached(marker));
        assert!(!page.is_overlay(owner));
    }

    #[test]
    fn test_removed_subtree_is_freed() {
        let page = MemoryPage::from_html("<p>keep this</p><div><p>drop <b>all</b> of this</p></div>");
        let div = page.elements_by_tag("div")[0];
        let inner_text = page.find_text("drop").unwrap();
        let before = page.node_count();

        page.remove_node(div).unwrap();
        assert_eq!(page.node_count(), before - 6);
        assert!(matches!(page.text(inner_text), Err(PageError::Detached(_))));
        assert!(!page.is_overlay(inner_text));
        assert!(matches!(
            page.text(NodeId(10_000)),
            Err(PageError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_layout_is_cached_until_content_moves() {
        let page = MemoryPage::from_html("<p>first line</p><p>second line</p>");
        let first = page.find_text("first").unwrap();
        let second = page.find_text("second").unwrap();

        page.range_rects(first, 0, 5).unwrap();
        assert!(page.lock().layout.is_some());

        // Scrolling only shifts client coordinates
        page.scroll_to(0.0, 4.0);
        assert!(page.lock().layout.is_some());
        assert!((page.range_rects(second, 0, 6).unwrap()[0].top - 12.0).abs() < f64::EPSILON);

        page.set_text(first, "first line now wraps onto a second line of text that is long")
            .unwrap();
        assert!(page.lock().layout.is_none());
        page.resize(80.0, 600.0);
        let wrapped = page.range_rects(second, 0, 6).unwrap()[0];
        // 60 chars at 10 per line push the second paragraph down six lines
        assert!((wrapped.top - (96.0 - 4.0)).abs() < f64::EPSILON);
    }
}
