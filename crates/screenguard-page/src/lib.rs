//! ScreenGuard Page - the host document and everything drawn on top of it.
//!
//! The scan pipeline never touches a concrete DOM. It talks to a [`Page`]:
//! a tree of element and text nodes with live layout, plus an overlay
//! surface for masks. [`MemoryPage`] implements it with a deterministic
//! layout model and can be built from HTML.
//!
//! # Components
//!
//! - [`TextWalker`]: qualifying text units in document order
//! - [`OverlayRenderer`]: text offsets and element boxes to screen rects
//! - [`FindingStore`]: per-unit findings and the overlays rendered for them
//! - [`ChangeMonitor`]: page events to debounced rescans and throttled
//!   repositions
//!
//! # Example
//!
//! ```rust
//! use screenguard_page::{MemoryPage, Page, TextWalker};
//! use screenguard_core::ScanningConfig;
//!
//! let page = MemoryPage::from_html("<p>Contact me at alice@example.com</p><script>x()</script>");
//! let units = TextWalker::new(&ScanningConfig::default()).collect_text_units(&page, page.root());
//! assert_eq!(units.len(), 1);
//! assert_eq!(units[0].text, "Contact me at alice@example.com");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod memory;
pub mod monitor;
pub mod page;
pub mod render;
pub mod reveal;
pub mod store;
pub mod walker;

// Re-export commonly used types
pub use error::{PageError, Result};
pub use memory::{MemoryPage, OverlaySnapshot, GLYPH_WIDTH, LINE_HEIGHT};
pub use monitor::{ChangeMonitor, ScheduledAction, Signal};
pub use page::{
    NodeId, NodeKind, OverlayId, OverlayKind, OverlaySpec, Page, PageEvent, OVERLAY_MARKER,
};
pub use render::{Overlay, OverlayRenderer};
pub use reveal::RevealState;
pub use store::{FindingStore, UnitContent};
pub use walker::{collect_image_units, ImageUnit, TextUnit, TextWalker};
