//! Per-unit findings and the overlays rendered for them.

use crate::page::{NodeId, OverlayId};
use crate::render::{Overlay, OverlayRenderer};
use screenguard_core::{Finding, ImageVerdict};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// What a masked unit was flagged for.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitContent {
    /// Accepted findings of a text node
    Text(Vec<Finding>),
    /// Verdict of an image element
    Image(ImageVerdict),
}

#[derive(Debug)]
struct UnitEntry {
    content: UnitContent,
    overlays: Vec<Overlay>,
}

/// Owns every finding list and overlay lifetime.
///
/// Setting a unit's findings always removes its previous overlays first, so
/// a unit never carries duplicate or stale masks.
pub struct FindingStore {
    renderer: OverlayRenderer,
    units: BTreeMap<NodeId, UnitEntry>,
}

impl FindingStore {
    /// Create an empty store drawing through `renderer`.
    #[must_use]
    pub fn new(renderer: OverlayRenderer) -> Self {
        Self {
            renderer,
            units: BTreeMap::new(),
        }
    }

    /// Renderer used by this store.
    #[must_use]
    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    /// Replace a text unit's findings and regenerate its overlays.
    ///
    /// Returns the number of overlays drawn. An empty list just clears the
    /// unit.
    pub fn set_findings(&mut self, node: NodeId, findings: Vec<Finding>) -> usize {
        self.remove_unit(node);
        if findings.is_empty() {
            return 0;
        }

        let overlays = self
            .renderer
            .render_findings_for(node, &findings)
            .unwrap_or_else(|e| {
                tracing::warn!("Could not render findings for {}: {}", node, e);
                Vec::new()
            });
        let drawn = overlays.len();

        self.units.insert(
            node,
            UnitEntry {
                content: UnitContent::Text(findings),
                overlays,
            },
        );
        drawn
    }

    /// Replace an image unit's verdict and regenerate its overlay.
    pub fn set_image_verdict(
        &mut self,
        node: NodeId,
        verdict: ImageVerdict,
    ) -> Option<OverlayId> {
        self.remove_unit(node);

        let overlay = match self.renderer.render_image_verdict(node, &verdict) {
            Ok(overlay) => overlay?,
            Err(e) => {
                tracing::warn!("Could not render image overlay for {}: {}", node, e);
                return None;
            }
        };
        let id = overlay.id;

        self.units.insert(
            node,
            UnitEntry {
                content: UnitContent::Image(verdict),
                overlays: vec![overlay],
            },
        );
        Some(id)
    }

    /// Overlays currently drawn for `node`.
    #[must_use]
    pub fn get_overlays(&self, node: NodeId) -> &[Overlay] {
        self.units
            .get(&node)
            .map(|entry| entry.overlays.as_slice())
            .unwrap_or_default()
    }

    /// Findings recorded for a text unit.
    #[must_use]
    pub fn findings(&self, node: NodeId) -> Option<&[Finding]> {
        match self.units.get(&node).map(|entry| &entry.content) {
            Some(UnitContent::Text(findings)) => Some(findings),
            _ => None,
        }
    }

    /// Whether `node` currently has at least one overlay.
    #[must_use]
    pub fn is_masked(&self, node: NodeId) -> bool {
        !self.get_overlays(node).is_empty()
    }

    /// Total overlays across all units.
    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.units.values().map(|entry| entry.overlays.len()).sum()
    }

    /// Number of units with recorded content.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Remove every overlay from the page and empty the store.
    pub fn clear_all(&mut self) {
        let page = self.renderer.page();
        for entry in std::mem::take(&mut self.units).into_values() {
            for overlay in entry.overlays {
                page.remove_overlay(overlay.id);
            }
        }
    }

    /// Drop units whose node left the document. Returns how many were pruned.
    pub fn prune_detached(&mut self) -> usize {
        let page = self.renderer.page().clone();
        let detached: Vec<NodeId> = self
            .units
            .keys()
            .filter(|node| !page.is_attached(**node))
            .copied()
            .collect();

        for node in &detached {
            self.remove_unit(*node);
        }
        if !detached.is_empty() {
            tracing::debug!("Pruned {} detached units", detached.len());
        }
        detached.len()
    }

    /// Move every overlay to its unit's current geometry.
    pub fn reposition_all(&mut self) {
        for (node, entry) in &mut self.units {
            if let Err(e) = self
                .renderer
                .reposition(*node, &entry.content, &mut entry.overlays)
            {
                tracing::warn!("Reposition failed for {}: {}", node, e);
            }
        }
    }

    /// Reveal the content under an overlay for `duration`.
    ///
    /// Returns false when the overlay is not in the store.
    pub fn reveal(&mut self, id: OverlayId, now: Instant, duration: Duration) -> bool {
        let page = self.renderer.page().clone();
        let Some(overlay) = self.overlay_mut(id) else {
            return false;
        };
        if let Err(e) = page.set_overlay_revealed(id, true) {
            tracing::warn!("Could not reveal {}: {}", id, e);
            return false;
        }
        overlay.reveal.reveal(now, duration);
        true
    }

    /// Re-mask overlays whose reveal deadline has passed.
    pub fn expire_reveals(&mut self, now: Instant) -> Vec<OverlayId> {
        let page = self.renderer.page().clone();
        let mut expired = Vec::new();
        for overlay in self.units.values_mut().flat_map(|e| e.overlays.iter_mut()) {
            if overlay.reveal.expire(now) {
                if let Err(e) = page.set_overlay_revealed(overlay.id, false) {
                    tracing::warn!("Could not re-mask {}: {}", overlay.id, e);
                }
                expired.push(overlay.id);
            }
        }
        expired
    }

    /// Earliest pending reveal deadline.
    #[must_use]
    pub fn next_reveal_deadline(&self) -> Option<Instant> {
        self.units
            .values()
            .flat_map(|e| e.overlays.iter())
            .filter_map(|o| o.reveal.expires_at())
            .min()
    }

    fn overlay_mut(&mut self, id: OverlayId) -> Option<&mut Overlay> {
        self.units
            .values_mut()
            .flat_map(|e| e.overlays.iter_mut())
            .find(|o| o.id == id)
    }

    fn remove_unit(&mut self, node: NodeId) {
        if let Some(entry) = self.units.remove(&node) {
            let page = self.renderer.page();
            for overlay in entry.overlays {
                page.remove_overlay(overlay.id);
            }
        }
    }
}
