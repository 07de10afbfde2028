//! Page-snapshot capture pipeline.
//!
//! Background work that measures page breaks ("page CFIs") for every spine
//! of every downloaded book, one spine at a time, at both the current and
//! the flipped viewport orientation. Selection is a pure function over the
//! library and the skip list; the session controller is an explicit state
//! machine driven by events and answering with effects, so the whole
//! pipeline runs deterministically under test. A spine that stalls is set
//! aside with exponential backoff and retried indefinitely; nothing in here
//! ever surfaces a failure to the reader UI.

mod controller;
mod messages;
mod select;
mod skip;

pub use controller::{CaptureController, Effect, Phase};
pub use messages::CaptureEvent;
pub use select::select_next;
pub use skip::SkipList;

use crate::layout::{self, DisplaySettings, Viewport};
use crate::library::BookId;
use once_cell::sync::Lazy;
use regex::Regex;

/// One pending unit of work: a single spine at a single orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTarget {
    pub book_id: BookId,
    pub spine_idref: String,
    pub viewport: Viewport,
    pub display_settings: DisplaySettings,
}

impl CaptureTarget {
    /// Identity of this target for skip-list and timeout bookkeeping.
    pub fn capture_key(&self) -> CaptureKey {
        CaptureKey::for_spine(
            self.book_id,
            &self.spine_idref,
            &layout::size_key(self.viewport, &self.display_settings),
        )
    }
}

static BOOK_ID_IN_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d+)/[^/]+$").expect("static capture-key regex"));

/// Identity of one (book, spine, size key) combination, formatted as the
/// snapshot URI under which the captured page images are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureKey(String);

impl CaptureKey {
    pub fn for_spine(book_id: BookId, idref: &str, size_key: &str) -> Self {
        CaptureKey(format!("snapshots/{book_id}/{idref}_{size_key}"))
    }

    /// The book id component of the key, recovered from the URI path.
    pub fn book_id(&self) -> Option<BookId> {
        BOOK_ID_IN_KEY
            .captures(&self.0)
            .and_then(|caps| caps.get(1))
            .and_then(|id| id.as_str().parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CaptureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_key_embeds_book_spine_and_size() {
        let key = CaptureKey::for_spine(42, "ch3", "800x1200_100-100-default-theme");
        assert_eq!(
            key.as_str(),
            "snapshots/42/ch3_800x1200_100-100-default-theme"
        );
    }

    #[test]
    fn book_id_round_trips_through_the_key() {
        let key = CaptureKey::for_spine(907, "intro", "1200x800_120-100-night");
        assert_eq!(key.book_id(), Some(907));
    }

    #[test]
    fn target_and_key_agree() {
        let target = CaptureTarget {
            book_id: 7,
            spine_idref: "ch1".to_string(),
            viewport: Viewport::new(800, 1200),
            display_settings: DisplaySettings::default(),
        };
        assert_eq!(
            target.capture_key(),
            CaptureKey::for_spine(7, "ch1", "800x1200_100-100-default-theme")
        );
    }
}
