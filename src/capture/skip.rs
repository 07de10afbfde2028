//! Stall bookkeeping with exponential backoff.
//!
//! A capture key lands here when its renderer session produced neither
//! progress nor completion within the allotted time. While `skip` is set the
//! key is invisible to target selection; once its backoff elapses it becomes
//! eligible again, with a doubled allowance for the next attempt. The
//! per-key backoff keeps one perpetually wedged spine from monopolizing the
//! pipeline, and the cap bounds how stale a retry can get.

use super::CaptureKey;
use crate::library::BookId;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SkipEntry {
    skip: bool,
    timeout: Duration,
}

#[derive(Debug, Default)]
pub struct SkipList {
    entries: HashMap<CaptureKey, SkipEntry>,
}

impl SkipList {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the key is currently excluded from selection.
    pub fn should_skip(&self, key: &CaptureKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.skip)
    }

    /// Stall allowance to arm when this key is selected: its recorded
    /// backoff, or `initial` for a key with no stall history.
    pub fn allowance(&self, key: &CaptureKey, initial: Duration) -> Duration {
        self.entries
            .get(key)
            .map(|entry| entry.timeout)
            .unwrap_or(initial)
    }

    /// Record a stall: double the key's timeout (from `initial` on the first
    /// stall), cap it at `max`, and exclude the key from selection. Returns
    /// the new timeout, which is also the re-enable delay.
    pub fn register_stall(
        &mut self,
        key: &CaptureKey,
        initial: Duration,
        max: Duration,
    ) -> Duration {
        let base = self.allowance(key, initial);
        let timeout = base.saturating_mul(2).min(max);
        self.entries.insert(key.clone(), SkipEntry {
            skip: true,
            timeout,
        });
        timeout
    }

    /// Backoff elapsed: make the key selectable again, keeping its grown
    /// timeout for the next attempt. Returns false when the entry is gone
    /// (capture succeeded or the book was pruned in the meantime).
    pub fn resume(&mut self, key: &CaptureKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.skip = false;
                true
            }
            None => false,
        }
    }

    /// Capture succeeded; forget the key's stall history entirely.
    pub fn clear(&mut self, key: &CaptureKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry whose book is no longer downloaded. Returns how many
    /// entries were dropped.
    pub fn prune<F>(&mut self, is_downloaded: F) -> usize
    where
        F: Fn(BookId) -> bool,
    {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key.book_id().is_some_and(&is_downloaded));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INITIAL: Duration = Duration::from_millis(1_000);
    const MAX: Duration = Duration::from_millis(8_000);

    fn key(book_id: BookId) -> CaptureKey {
        CaptureKey::for_spine(book_id, "ch1", "800x1200_100-100-default-theme")
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut skip_list = SkipList::new();
        let key = key(1);

        // min(INITIAL * 2^N, MAX) after N consecutive stalls.
        for expected_ms in [2_000, 4_000, 8_000, 8_000] {
            let timeout = skip_list.register_stall(&key, INITIAL, MAX);
            assert_eq!(timeout, Duration::from_millis(expected_ms));
            assert!(skip_list.should_skip(&key));
        }
        assert_eq!(skip_list.allowance(&key, INITIAL), MAX);
    }

    #[test]
    fn resume_keeps_the_grown_allowance() {
        let mut skip_list = SkipList::new();
        let key = key(1);
        skip_list.register_stall(&key, INITIAL, MAX);

        assert!(skip_list.resume(&key));
        assert!(!skip_list.should_skip(&key));
        assert_eq!(
            skip_list.allowance(&key, INITIAL),
            Duration::from_millis(2_000)
        );
    }

    #[test]
    fn clear_resets_the_history() {
        let mut skip_list = SkipList::new();
        let key = key(1);
        skip_list.register_stall(&key, INITIAL, MAX);

        assert!(skip_list.clear(&key));
        assert!(!skip_list.clear(&key));
        assert!(!skip_list.resume(&key));
        assert_eq!(skip_list.allowance(&key, INITIAL), INITIAL);
    }

    #[test]
    fn prune_drops_undownloaded_books_only() {
        let mut skip_list = SkipList::new();
        skip_list.register_stall(&key(1), INITIAL, MAX);
        skip_list.register_stall(&key(2), INITIAL, MAX);
        skip_list.register_stall(&key(3), INITIAL, MAX);

        let dropped = skip_list.prune(|book_id| book_id == 2);
        assert_eq!(dropped, 2);
        assert_eq!(skip_list.len(), 1);
        assert!(skip_list.should_skip(&key(2)));
        assert!(!skip_list.should_skip(&key(1)));
    }
}
