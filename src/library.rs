//! Book registry and pagination cache.
//!
//! The registry is a snapshot of every known book: download state, spine
//! order, and — inside each spine — the captured page-break positions keyed
//! by size key. The host mutates it between controller events (download
//! queue, spine metadata arriving, removal from device); the capture
//! controller writes page breaks into it on successful completion. Nothing
//! here touches the filesystem: captured positions live in the book entity
//! and are persisted by whatever persists the books themselves.

use crate::layout::{self, DisplaySettings, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub type BookId = u64;

/// A page-break position. Canonical Fragment Identifiers are opaque to the
/// pipeline; they are produced and consumed by the renderer.
pub type PageCfi = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadStatus {
    NotDownloaded,
    Downloading,
    Downloaded,
}

impl Default for DownloadStatus {
    fn default() -> Self {
        DownloadStatus::NotDownloaded
    }
}

/// One chapter/section unit in a book's reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spine {
    pub idref: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Captured page breaks keyed by size key. An explicit `None` marks an
    /// entry that was invalidated; both absence and `None` read as "not yet
    /// captured for this size".
    #[serde(default)]
    pub page_cfis: HashMap<String, Option<Vec<PageCfi>>>,
}

impl Spine {
    pub fn new(idref: impl Into<String>) -> Self {
        Self {
            idref: idref.into(),
            label: None,
            page_cfis: HashMap::new(),
        }
    }

    pub fn is_captured(&self, size_key: &str) -> bool {
        matches!(self.page_cfis.get(size_key), Some(Some(_)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub download_status: DownloadStatus,
    #[serde(default)]
    pub spines: Vec<Spine>,
}

impl Book {
    fn spine_mut(&mut self, idref: &str) -> Option<&mut Spine> {
        self.spines.iter_mut().find(|spine| spine.idref == idref)
    }

    fn spine(&self, idref: &str) -> Option<&Spine> {
        self.spines.iter().find(|spine| spine.idref == idref)
    }
}

/// Every known book, ordered by ascending id. That ordering is the registry
/// order target selection iterates in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Library {
    books: BTreeMap<BookId, Book>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_book(&mut self, book: Book) {
        self.books.insert(book.id, book);
    }

    /// Removal from device. Returns the removed book, if it existed.
    pub fn remove_book(&mut self, id: BookId) -> Option<Book> {
        self.books.remove(&id)
    }

    pub fn set_download_status(&mut self, id: BookId, status: DownloadStatus) -> bool {
        match self.books.get_mut(&id) {
            Some(book) => {
                book.download_status = status;
                true
            }
            None => false,
        }
    }

    /// Replace a book's spine list, e.g. once its package document has been
    /// read. Existing captured page breaks for the book are discarded with
    /// the old spines.
    pub fn set_spines(&mut self, id: BookId, spines: Vec<Spine>) -> bool {
        match self.books.get_mut(&id) {
            Some(book) => {
                book.spines = spines;
                true
            }
            None => false,
        }
    }

    pub fn book(&self, id: BookId) -> Option<&Book> {
        self.books.get(&id)
    }

    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    pub fn is_downloaded(&self, id: BookId) -> bool {
        self.books
            .get(&id)
            .is_some_and(|book| book.download_status == DownloadStatus::Downloaded)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Captured page breaks for one spine at one size key, if any.
    pub fn page_breaks(&self, id: BookId, idref: &str, size_key: &str) -> Option<&[PageCfi]> {
        self.books
            .get(&id)?
            .spine(idref)?
            .page_cfis
            .get(size_key)?
            .as_deref()
    }

    /// True iff an entry exists for this size key and is non-null.
    pub fn is_captured(&self, id: BookId, idref: &str, size_key: &str) -> bool {
        self.books
            .get(&id)
            .and_then(|book| book.spine(idref))
            .is_some_and(|spine| spine.is_captured(size_key))
    }

    /// Record the page breaks measured for one spine at one size key.
    /// Idempotent, last-write-wins; the positions are opaque to this layer.
    /// Returns false when the book or spine no longer exists (removed while
    /// the capture was in flight), in which case the result is dropped.
    pub fn record_page_breaks(
        &mut self,
        id: BookId,
        idref: &str,
        size_key: &str,
        positions: Vec<PageCfi>,
    ) -> bool {
        let Some(spine) = self.books.get_mut(&id).and_then(|book| book.spine_mut(idref)) else {
            debug!(book_id = id, idref, "Dropping page breaks for a missing spine");
            return false;
        };
        debug!(
            book_id = id,
            idref,
            size_key,
            pages = positions.len(),
            "Recorded page breaks"
        );
        spine.page_cfis.insert(size_key.to_string(), Some(positions));
        true
    }

    /// (captured, total) spine counts across downloaded books at the size
    /// key of the given viewport and settings. Feeds the host's usage
    /// analytics display; the pipeline itself never reads it.
    pub fn capture_progress(
        &self,
        viewport: Viewport,
        settings: &DisplaySettings,
    ) -> (usize, usize) {
        let size_key = layout::size_key(viewport, settings);
        let mut captured = 0;
        let mut total = 0;
        for book in self.books.values() {
            if book.download_status != DownloadStatus::Downloaded {
                continue;
            }
            for spine in &book.spines {
                total += 1;
                if spine.is_captured(&size_key) {
                    captured += 1;
                }
            }
        }
        (captured, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with_spines(id: BookId, spines: &[&str]) -> Book {
        Book {
            id,
            title: format!("Book {id}"),
            download_status: DownloadStatus::Downloaded,
            spines: spines.iter().copied().map(Spine::new).collect(),
        }
    }

    #[test]
    fn books_iterate_in_ascending_id_order() {
        let mut library = Library::new();
        library.upsert_book(book_with_spines(20, &["a"]));
        library.upsert_book(book_with_spines(3, &["a"]));
        library.upsert_book(book_with_spines(11, &["a"]));
        let ids: Vec<BookId> = library.books().map(|book| book.id).collect();
        assert_eq!(ids, vec![3, 11, 20]);
    }

    #[test]
    fn absent_and_null_entries_read_as_uncaptured() {
        let mut library = Library::new();
        let mut book = book_with_spines(1, &["ch1"]);
        book.spines[0]
            .page_cfis
            .insert("800x1200_100-100-default-theme".to_string(), None);
        library.upsert_book(book);

        assert!(!library.is_captured(1, "ch1", "800x1200_100-100-default-theme"));
        assert!(!library.is_captured(1, "ch1", "1200x800_100-100-default-theme"));
        assert_eq!(
            library.page_breaks(1, "ch1", "800x1200_100-100-default-theme"),
            None
        );
    }

    #[test]
    fn record_page_breaks_is_idempotent() {
        let mut library = Library::new();
        library.upsert_book(book_with_spines(1, &["ch1"]));
        let positions = vec!["/4/2".to_string(), "/4/8".to_string()];

        assert!(library.record_page_breaks(1, "ch1", "key", positions.clone()));
        let once = library.clone();
        assert!(library.record_page_breaks(1, "ch1", "key", positions.clone()));

        assert_eq!(
            library.page_breaks(1, "ch1", "key"),
            once.page_breaks(1, "ch1", "key")
        );
        assert_eq!(
            library.page_breaks(1, "ch1", "key"),
            Some(positions.as_slice())
        );
    }

    #[test]
    fn recording_against_a_removed_book_is_dropped() {
        let mut library = Library::new();
        library.upsert_book(book_with_spines(1, &["ch1"]));
        library.remove_book(1);
        assert!(!library.record_page_breaks(1, "ch1", "key", vec!["/4/2".to_string()]));
    }

    #[test]
    fn capture_progress_counts_only_downloaded_books() {
        let viewport = Viewport::new(800, 1200);
        let settings = DisplaySettings::default();
        let size_key = layout::size_key(viewport, &settings);

        let mut library = Library::new();
        let mut done = book_with_spines(1, &["a", "b"]);
        done.spines[0]
            .page_cfis
            .insert(size_key.clone(), Some(vec!["/2".to_string()]));
        library.upsert_book(done);
        let mut pending = book_with_spines(2, &["c"]);
        pending.download_status = DownloadStatus::Downloading;
        library.upsert_book(pending);

        assert_eq!(library.capture_progress(viewport, &settings), (1, 2));
    }
}
