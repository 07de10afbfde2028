//! Capture target selection.
//!
//! A deliberately simple greedy policy: first eligible spine wins, favoring
//! earliest-registered books and earliest spines. Within a book every spine
//! is tried at the primary orientation before any spine is tried flipped, so
//! both portrait and landscape page breaks get captured without the user
//! ever rotating the device.

use super::skip::SkipList;
use super::{CaptureKey, CaptureTarget};
use crate::layout::{self, DisplaySettings, Viewport};
use crate::library::{DownloadStatus, Library};

/// Pick the single next spine needing capture, or `None` when no work
/// remains. Pure: timer arming is the controller's business.
pub fn select_next(
    library: &Library,
    viewport: Viewport,
    settings: &DisplaySettings,
    skip_list: &SkipList,
) -> Option<CaptureTarget> {
    for book in library.books() {
        if book.download_status != DownloadStatus::Downloaded || book.spines.is_empty() {
            continue;
        }
        for orientation in [viewport, viewport.flipped()] {
            let size_key = layout::size_key(orientation, settings);
            for spine in &book.spines {
                if spine.is_captured(&size_key) {
                    continue;
                }
                let key = CaptureKey::for_spine(book.id, &spine.idref, &size_key);
                if skip_list.should_skip(&key) {
                    continue;
                }
                return Some(CaptureTarget {
                    book_id: book.id,
                    spine_idref: spine.idref.clone(),
                    viewport: orientation,
                    display_settings: settings.clone(),
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{Book, BookId, Spine};
    use std::time::Duration;

    const VIEWPORT: Viewport = Viewport {
        width: 800,
        height: 1200,
    };

    fn settings() -> DisplaySettings {
        DisplaySettings::default()
    }

    fn downloaded_book(id: BookId, spines: &[&str]) -> Book {
        Book {
            id,
            title: format!("Book {id}"),
            download_status: DownloadStatus::Downloaded,
            spines: spines.iter().copied().map(Spine::new).collect(),
        }
    }

    fn capture_all(library: &mut Library, id: BookId, viewport: Viewport) {
        let size_key = layout::size_key(viewport, &settings());
        let idrefs: Vec<String> = library
            .book(id)
            .map(|book| book.spines.iter().map(|s| s.idref.clone()).collect())
            .unwrap_or_default();
        for idref in idrefs {
            library.record_page_breaks(id, &idref, &size_key, vec!["/2".to_string()]);
        }
    }

    #[test]
    fn picks_the_first_spine_of_the_first_downloaded_book() {
        let mut library = Library::new();
        library.upsert_book(downloaded_book(5, &["ch1", "ch2", "ch3"]));

        let target = select_next(&library, VIEWPORT, &settings(), &SkipList::new()).unwrap();
        assert_eq!(target.book_id, 5);
        assert_eq!(target.spine_idref, "ch1");
        assert_eq!(target.viewport, VIEWPORT);
    }

    #[test]
    fn skips_books_that_are_not_fully_downloaded_or_lack_spines() {
        let mut library = Library::new();
        let mut downloading = downloaded_book(1, &["ch1"]);
        downloading.download_status = DownloadStatus::Downloading;
        library.upsert_book(downloading);
        library.upsert_book(downloaded_book(2, &[]));
        library.upsert_book(downloaded_book(3, &["intro"]));

        let target = select_next(&library, VIEWPORT, &settings(), &SkipList::new()).unwrap();
        assert_eq!(target.book_id, 3);
    }

    #[test]
    fn skip_listed_spines_are_passed_over() {
        let mut library = Library::new();
        library.upsert_book(downloaded_book(1, &["ch1", "ch2"]));

        let mut skip_list = SkipList::new();
        let size_key = layout::size_key(VIEWPORT, &settings());
        skip_list.register_stall(
            &CaptureKey::for_spine(1, "ch1", &size_key),
            Duration::from_secs(1),
            Duration::from_secs(8),
        );

        let target = select_next(&library, VIEWPORT, &settings(), &skip_list).unwrap();
        assert_eq!(target.spine_idref, "ch2");
    }

    #[test]
    fn falls_back_to_the_flipped_orientation_per_book() {
        let mut library = Library::new();
        library.upsert_book(downloaded_book(1, &["ch1", "ch2"]));
        capture_all(&mut library, 1, VIEWPORT);

        let target = select_next(&library, VIEWPORT, &settings(), &SkipList::new()).unwrap();
        assert_eq!(target.spine_idref, "ch1");
        assert_eq!(target.viewport, VIEWPORT.flipped());
    }

    #[test]
    fn primary_orientation_of_a_later_book_loses_to_flipped_of_an_earlier_one() {
        let mut library = Library::new();
        library.upsert_book(downloaded_book(1, &["ch1"]));
        library.upsert_book(downloaded_book(2, &["other"]));
        capture_all(&mut library, 1, VIEWPORT);

        // Book 1 still has flipped-orientation work, and books are visited
        // in registry order, so book 2 waits.
        let target = select_next(&library, VIEWPORT, &settings(), &SkipList::new()).unwrap();
        assert_eq!(target.book_id, 1);
        assert_eq!(target.viewport, VIEWPORT.flipped());
    }

    #[test]
    fn returns_none_when_everything_is_captured() {
        let mut library = Library::new();
        library.upsert_book(downloaded_book(1, &["ch1", "ch2"]));
        capture_all(&mut library, 1, VIEWPORT);
        capture_all(&mut library, 1, VIEWPORT.flipped());

        assert!(select_next(&library, VIEWPORT, &settings(), &SkipList::new()).is_none());
    }

    #[test]
    fn null_cache_entries_count_as_uncaptured() {
        let mut library = Library::new();
        let mut book = downloaded_book(1, &["ch1"]);
        let size_key = layout::size_key(VIEWPORT, &settings());
        book.spines[0].page_cfis.insert(size_key, None);
        library.upsert_book(book);

        let target = select_next(&library, VIEWPORT, &settings(), &SkipList::new()).unwrap();
        assert_eq!(target.spine_idref, "ch1");
        assert_eq!(target.viewport, VIEWPORT);
    }
}
