//! Turns page events into scheduled pipeline work.
//!
//! Content mutations are debounced into a single rescan; viewport changes
//! are throttled to at most one reposition per frame. Mutations that only
//! touch this system's own overlays are ignored, so drawing masks never
//! triggers another scan.

use crate::page::{NodeId, OverlayId, Page, PageEvent};
use screenguard_core::MonitorConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Meaning of a single page event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Page content changed; a rescan is needed
    ContentChanged,
    /// Geometry changed; overlays must move
    ViewportChanged,
    /// User clicked an overlay
    Activated(OverlayId),
    /// Caused by our own overlays
    Ignored,
}

/// Work the runtime should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Full scan pass
    Rescan,
    /// Prune and reposition pass, no reclassification
    Reposition,
    /// Reveal an overlay
    Reveal(OverlayId),
}

/// Debouncing event producer for the scan pipeline.
pub struct ChangeMonitor {
    page: Arc<dyn Page>,
    rescan_delay: Duration,
    frame_interval: Duration,
}

impl ChangeMonitor {
    /// Create a monitor for `page`.
    #[must_use]
    pub fn new(page: Arc<dyn Page>, config: &MonitorConfig) -> Self {
        Self {
            page,
            rescan_delay: Duration::from_millis(config.rescan_delay_ms),
            frame_interval: Duration::from_millis(config.frame_interval_ms.max(1)),
        }
    }

    /// Classify one event.
    #[must_use]
    pub fn classify(&self, event: &PageEvent) -> Signal {
        match event {
            PageEvent::Mutation {
                added,
                removed,
                character_data,
            } => {
                if self.any_content(added) || self.any_content(character_data) {
                    Signal::ContentChanged
                } else if self.any_content(removed) {
                    // Removed content only needs its overlays pruned
                    Signal::ViewportChanged
                } else {
                    Signal::Ignored
                }
            }
            PageEvent::Scroll | PageEvent::Resize => Signal::ViewportChanged,
            PageEvent::OverlayActivated(id) => Signal::Activated(*id),
        }
    }

    fn any_content(&self, nodes: &[NodeId]) -> bool {
        nodes.iter().any(|node| !self.page.is_overlay(*node))
    }

    /// Subscribe to the page and run on a background task.
    pub fn spawn(self) -> (mpsc::UnboundedReceiver<ScheduledAction>, JoinHandle<()>) {
        let events = self.page.observe();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(events, tx));
        (rx, handle)
    }

    /// Consume `events` until the page or the action consumer goes away.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<PageEvent>,
        actions: mpsc::UnboundedSender<ScheduledAction>,
    ) {
        let mut rescan_at: Option<Instant> = None;
        let mut reposition_at: Option<Instant> = None;

        loop {
            let action = tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    match self.classify(&event) {
                        Signal::ContentChanged => {
                            rescan_at = Some(Instant::now() + self.rescan_delay);
                            None
                        }
                        Signal::ViewportChanged => {
                            reposition_at.get_or_insert_with(|| Instant::now() + self.frame_interval);
                            None
                        }
                        Signal::Activated(id) => Some(ScheduledAction::Reveal(id)),
                        Signal::Ignored => None,
                    }
                }
                () = sleep_until(rescan_at.unwrap_or_else(Instant::now)), if rescan_at.is_some() => {
                    rescan_at = None;
                    Some(ScheduledAction::Rescan)
                }
                () = sleep_until(reposition_at.unwrap_or_else(Instant::now)), if reposition_at.is_some() => {
                    reposition_at = None;
                    Some(ScheduledAction::Reposition)
                }
            };

            if let Some(action) = action {
                tracing::trace!("Scheduling {:?}", action);
                if actions.send(action).is_err() {
                    break;
                }
            }
        }

        tracing::debug!("Change monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPage;
    use crate::page::{OverlayKind, OverlaySpec};
    use screenguard_core::Rect;

    fn monitor(page: &Arc<MemoryPage>) -> ChangeMonitor {
        let dyn_page: Arc<dyn Page> = page.clone();
        ChangeMonitor::new(dyn_page, &MonitorConfig::default())
    }

    async fn no_action_within(
        actions: &mut mpsc::UnboundedReceiver<ScheduledAction>,
        window: Duration,
    ) -> bool {
        tokio::time::timeout(window, actions.recv()).await.is_err()
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_burst_coalesces_into_one_rescan() {
        let page = Arc::new(MemoryPage::from_html("<p>hello world</p>"));
        let node = page.find_text("hello").unwrap();
        let (mut actions, _handle) = monitor(&page).spawn();

        for i in 0..5 {
            page.set_text(node, &format!("hello world {i}")).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let waited_from = Instant::now();
        assert_eq!(actions.recv().await, Some(ScheduledAction::Rescan));
        assert!(waited_from.elapsed() >= Duration::from_millis(1900));
        assert!(no_action_within(&mut actions, Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_added_content_triggers_rescan() {
        let page = Arc::new(MemoryPage::new());
        let (mut actions, _handle) = monitor(&page).spawn();

        let p = page.append_element(page.root(), "p").unwrap();
        page.append_text(p, "fresh content arrived").unwrap();

        assert_eq!(actions.recv().await, Some(ScheduledAction::Rescan));
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_overlays_are_ignored() {
        let page = Arc::new(MemoryPage::from_html("<p>Contact me at alice@example.com</p>"));
        let owner = page.find_text("alice").unwrap();
        let (mut actions, _handle) = monitor(&page).spawn();

        let id = page
            .insert_overlay(OverlaySpec {
                owner,
                kind: OverlayKind::Image,
                rect: Rect::new(0.0, 0.0, 50.0, 50.0),
            })
            .unwrap();
        page.remove_overlay(id);

        assert!(no_action_within(&mut actions, Duration::from_secs(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_burst_throttled_to_one_reposition() {
        let page = Arc::new(MemoryPage::from_html("<p>hello world</p>"));
        let (mut actions, _handle) = monitor(&page).spawn();

        for y in 0..10 {
            page.scroll_to(0.0, f64::from(y) * 10.0);
        }

        assert_eq!(actions.recv().await, Some(ScheduledAction::Reposition));
        assert!(no_action_within(&mut actions, Duration::from_millis(100)).await);

        page.resize(800.0, 600.0);
        assert_eq!(actions.recv().await, Some(ScheduledAction::Reposition));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_content_schedules_reposition() {
        let page = Arc::new(MemoryPage::from_html("<p>going away soon</p>"));
        let p = page.elements_by_tag("p")[0];
        let (mut actions, _handle) = monitor(&page).spawn();

        page.remove_node(p).unwrap();
        assert_eq!(actions.recv().await, Some(ScheduledAction::Reposition));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_schedules_reveal() {
        let page = Arc::new(MemoryPage::from_html("<p>Contact me at alice@example.com</p>"));
        let owner = page.find_text("alice").unwrap();
        let id = page
            .insert_overlay(OverlaySpec {
                owner,
                kind: OverlayKind::Image,
                rect: Rect::new(0.0, 0.0, 50.0, 50.0),
            })
            .unwrap();
        let (mut actions, _handle) = monitor(&page).spawn();

        page.activate_overlay(id).unwrap();
        assert_eq!(actions.recv().await, Some(ScheduledAction::Reveal(id)));
    }

    #[test]
    fn test_classify() {
        let page = Arc::new(MemoryPage::from_html("<p>hello world</p>"));
        let node = page.find_text("hello").unwrap();
        let monitor = monitor(&page);

        assert_eq!(
            monitor.classify(&PageEvent::character_data(node)),
            Signal::ContentChanged
        );
        assert_eq!(monitor.classify(&PageEvent::Scroll), Signal::ViewportChanged);
        assert_eq!(
            monitor.classify(&PageEvent::added(Vec::new())),
            Signal::Ignored
        );
    }
}
