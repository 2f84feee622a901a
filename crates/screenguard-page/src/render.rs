//! Mapping findings and image verdicts to overlay rectangles.

use crate::error::{PageError, Result};
use crate::page::{NodeId, OverlayId, OverlayKind, OverlaySpec, Page};
use crate::reveal::RevealState;
use crate::store::UnitContent;
use screenguard_core::text::{char_len, locate};
use screenguard_core::{Finding, ImageConfig, ImageVerdict, Rect, ScanningConfig};
use std::sync::Arc;

/// A rendered mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    /// Overlay id on the page
    pub id: OverlayId,
    /// Content unit the overlay belongs to
    pub owner: NodeId,
    /// What is masked
    pub kind: OverlayKind,
    /// Current client rect
    pub rect: Rect,
    /// Index into the unit's findings, `None` for image overlays
    pub finding: Option<usize>,
    /// Click-to-reveal state
    pub reveal: RevealState,
}

/// Turns findings and verdicts into overlays on a [`Page`].
pub struct OverlayRenderer {
    page: Arc<dyn Page>,
    min_rect_size: f64,
    min_visible_size: f64,
}

impl OverlayRenderer {
    /// Create a renderer drawing on `page`.
    #[must_use]
    pub fn new(page: Arc<dyn Page>, scanning: &ScanningConfig, images: &ImageConfig) -> Self {
        Self {
            page,
            min_rect_size: scanning.min_rect_size,
            min_visible_size: images.min_visible_size,
        }
    }

    /// Page this renderer draws on.
    #[must_use]
    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// Renderable rects for one finding against the node's current text.
    ///
    /// The value is located from the declared start first, then anywhere in
    /// the text, so findings survive small shifts in the node's content.
    fn finding_rects(&self, node: NodeId, text: &str, finding: &Finding) -> Result<Vec<Rect>> {
        let (start, end) =
            locate(text, &finding.value, finding.start).ok_or(PageError::ValueNotFound {
                node,
                len: char_len(&finding.value),
            })?;

        Ok(self
            .page
            .range_rects(node, start, end)?
            .into_iter()
            .filter(|rect| rect.is_renderable(self.min_rect_size))
            .collect())
    }

    fn draw(
        &self,
        owner: NodeId,
        kind: OverlayKind,
        rect: Rect,
        finding: Option<usize>,
    ) -> Result<Overlay> {
        let id = self.page.insert_overlay(OverlaySpec { owner, kind, rect })?;
        Ok(Overlay {
            id,
            owner,
            kind,
            rect,
            finding,
            reveal: RevealState::Masked,
        })
    }

    /// Draw overlays for every locatable finding of a text node.
    ///
    /// A finding that cannot be located or drawn is skipped; the others are
    /// still rendered. Fails only when the node's text cannot be read.
    pub fn render_findings_for(
        &self,
        node: NodeId,
        findings: &[Finding],
    ) -> Result<Vec<Overlay>> {
        let text = self.page.text(node)?;
        let mut overlays = Vec::new();

        for (index, finding) in findings.iter().enumerate() {
            let rects = match self.finding_rects(node, &text, finding) {
                Ok(rects) => rects,
                Err(e) => {
                    tracing::warn!("Skipping {} finding in {}: {}", finding.kind, node, e);
                    continue;
                }
            };

            for rect in rects {
                match self.draw(node, OverlayKind::Pii(finding.kind), rect, Some(index)) {
                    Ok(overlay) => overlays.push(overlay),
                    Err(e) => tracing::warn!("Failed to draw overlay for {}: {}", node, e),
                }
            }
        }

        Ok(overlays)
    }

    /// Draw the overlay for an unsafe image.
    ///
    /// Returns `None` for verdicts that are not unsafe and for boxes not
    /// larger than the minimum visible size in both dimensions.
    pub fn render_image_verdict(
        &self,
        node: NodeId,
        verdict: &ImageVerdict,
    ) -> Result<Option<Overlay>> {
        if verdict.is_unsafe != Some(true) {
            return Ok(None);
        }
        let rect = self.page.bounding_box(node)?;
        if !rect.is_renderable(self.min_visible_size) {
            tracing::debug!("Image {} too small to mask ({}x{})", node, rect.width, rect.height);
            return Ok(None);
        }
        self.draw(node, OverlayKind::Image, rect, None).map(Some)
    }

    /// Recompute a unit's rects from live layout and update its overlays in
    /// place. Never reclassifies.
    ///
    /// When a text finding rewraps onto more or fewer lines, overlays are
    /// added or removed so each finding keeps one overlay per line.
    pub fn reposition(
        &self,
        node: NodeId,
        content: &UnitContent,
        overlays: &mut Vec<Overlay>,
    ) -> Result<()> {
        match content {
            UnitContent::Text(findings) => self.reposition_text(node, findings, overlays),
            UnitContent::Image(_) => self.reposition_image(node, overlays),
        }
    }

    fn reposition_text(
        &self,
        node: NodeId,
        findings: &[Finding],
        overlays: &mut Vec<Overlay>,
    ) -> Result<()> {
        let text = self.page.text(node)?;
        let mut updated = Vec::with_capacity(overlays.len());

        for (index, finding) in findings.iter().enumerate() {
            let (mut existing, rest): (Vec<Overlay>, Vec<Overlay>) = overlays
                .drain(..)
                .partition(|o| o.finding == Some(index));
            *overlays = rest;

            let rects = self.finding_rects(node, &text, finding).unwrap_or_else(|e| {
                tracing::debug!("Finding in {} no longer locatable: {}", node, e);
                Vec::new()
            });
            let reveal = existing.first().map(|o| o.reveal).unwrap_or_default();

            for rect in rects {
                if existing.is_empty() {
                    match self.draw(node, OverlayKind::Pii(finding.kind), rect, Some(index)) {
                        Ok(mut overlay) => {
                            if reveal.is_revealed()
                                && self.page.set_overlay_revealed(overlay.id, true).is_ok()
                            {
                                overlay.reveal = reveal;
                            }
                            updated.push(overlay);
                        }
                        Err(e) => tracing::warn!("Failed to draw overlay for {}: {}", node, e),
                    }
                } else {
                    let mut overlay = existing.remove(0);
                    if let Err(e) = self.page.move_overlay(overlay.id, rect) {
                        tracing::warn!("Dropping overlay {} of {}: {}", overlay.id, node, e);
                        continue;
                    }
                    overlay.rect = rect;
                    updated.push(overlay);
                }
            }

            for stale in existing {
                self.page.remove_overlay(stale.id);
            }
        }

        // Overlays pointing past the finding list cannot be repositioned
        for orphan in overlays.drain(..) {
            self.page.remove_overlay(orphan.id);
        }
        *overlays = updated;
        Ok(())
    }

    fn reposition_image(&self, node: NodeId, overlays: &mut Vec<Overlay>) -> Result<()> {
        let rect = self.page.bounding_box(node)?;
        if !rect.is_renderable(self.min_visible_size) {
            for overlay in overlays.drain(..) {
                self.page.remove_overlay(overlay.id);
            }
            return Ok(());
        }
        for overlay in overlays.iter_mut() {
            self.page.move_overlay(overlay.id, rect)?;
            overlay.rect = rect;
        }
        Ok(())
    }
}
