//! Per-topic live subscription counts.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

/// Lower-cased topic name to number of unreleased subscriptions.
///
/// Entries are created on first subscribe and only ever decremented afterwards, so a
/// topic that goes dead and comes back reuses its entry. [`TopicTable::clear`] is the
/// only way entries disappear.
#[derive(Debug, Default)]
pub(crate) struct TopicTable {
    counts: DashMap<String, AtomicUsize>,
}

impl TopicTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Counts one more subscription on `key`. Returns the new live count.
    pub(crate) fn acquire(&self, key: &str) -> usize {
        self.counts
            .entry(key.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }

    /// Counts one subscription less on `key`, never going below zero.
    /// Returns the new live count.
    pub(crate) fn release(&self, key: &str) -> usize {
        match self.counts.get(key) {
            Some(count) => count
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .map(|previous| previous - 1)
                .unwrap_or(0),
            None => 0,
        }
    }

    pub(crate) fn live_count(&self, key: &str) -> usize {
        self.counts
            .get(key)
            .map(|count| count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub(crate) fn is_live(&self, key: &str) -> bool {
        self.live_count(key) > 0
    }

    /// Number of topics ever seen since the last clear.
    pub(crate) fn known_topics(&self) -> usize {
        self.counts.len()
    }

    pub(crate) fn clear(&self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release_track_liveness() {
        let table = TopicTable::new();
        assert!(!table.is_live("fares"));

        assert_eq!(table.acquire("fares"), 1);
        assert_eq!(table.acquire("fares"), 2);
        assert!(table.is_live("fares"));

        assert_eq!(table.release("fares"), 1);
        assert_eq!(table.release("fares"), 0);
        assert!(!table.is_live("fares"));
        // The entry survives going dead.
        assert_eq!(table.known_topics(), 1);
    }

    #[test]
    fn test_release_floors_at_zero() {
        let table = TopicTable::new();
        assert_eq!(table.release("never"), 0);

        table.acquire("once");
        table.release("once");
        assert_eq!(table.release("once"), 0);
        assert_eq!(table.live_count("once"), 0);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let table = TopicTable::new();
        table.acquire("a");
        table.acquire("b");
        table.clear();
        assert_eq!(table.known_topics(), 0);
        assert!(!table.is_live("a"));
    }
}
