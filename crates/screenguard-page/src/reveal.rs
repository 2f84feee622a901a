//! Click-to-reveal state of a single overlay.

use std::time::Duration;
use tokio::time::Instant;

/// Per-overlay reveal state.
///
/// `Masked -> Revealed { expires_at } -> Masked`. Revealing an already
/// revealed overlay extends the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RevealState {
    /// Content hidden
    #[default]
    Masked,
    /// Content shown until `expires_at`
    Revealed {
        /// When the mask returns
        expires_at: Instant,
    },
}

impl RevealState {
    /// Reveal for `duration` starting at `now`.
    pub fn reveal(&mut self, now: Instant, duration: Duration) {
        *self = Self::Revealed {
            expires_at: now + duration,
        };
    }

    /// Return to `Masked` if the deadline has passed. Returns true on change.
    pub fn expire(&mut self, now: Instant) -> bool {
        match *self {
            Self::Revealed { expires_at } if expires_at <= now => {
                *self = Self::Masked;
                true
            }
            _ => false,
        }
    }

    /// Whether content is shown.
    #[must_use]
    pub fn is_revealed(&self) -> bool {
        matches!(self, Self::Revealed { .. })
    }

    /// Pending deadline, if revealed.
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        match self {
            Self::Revealed { expires_at } => Some(*expires_at),
            Self::Masked => None,
        }
    }
}
