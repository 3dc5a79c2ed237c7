//! Bounded, newest-first buffer of recent results.

use crate::models::ResultEnvelope;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of results retained for display.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Fixed-capacity ring of result envelopes.
///
/// The front of the deque is the newest entry. Pushing at capacity silently
/// drops the oldest one.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    entries: VecDeque<Arc<ResultEnvelope>>,
    capacity: usize,
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryRing {
    /// Create an empty ring. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, envelope: Arc<ResultEnvelope>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(envelope);
    }

    /// Replay entries given oldest-first, as `/history` returns them.
    pub fn seed<I>(&mut self, oldest_first: I)
    where
        I: IntoIterator<Item = Arc<ResultEnvelope>>,
    {
        for envelope in oldest_first {
            self.push(envelope);
        }
    }

    /// Retained entries, newest first.
    pub fn to_sequence(&self) -> Vec<Arc<ResultEnvelope>> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[allow(dead_code)] // Fixed at construction; exposed for callers that size views
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawAnalysis;

    fn envelope(id: &str) -> Arc<ResultEnvelope> {
        let raw = RawAnalysis {
            id: Some(id.into()),
            risk_score: Some(10.0),
            ..Default::default()
        };
        Arc::new(raw.normalize(format!("text {}", id)).unwrap())
    }

    fn ids(ring: &HistoryRing) -> Vec<String> {
        ring.to_sequence().iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_length_is_bounded_by_capacity() {
        for pushes in 0..12 {
            let mut ring = HistoryRing::new(5);
            for i in 0..pushes {
                ring.push(envelope(&i.to_string()));
            }
            assert_eq!(ring.to_sequence().len(), pushes.min(5));
        }
    }

    #[test]
    fn test_newest_first_with_eviction() {
        let mut ring = HistoryRing::new(3);
        for id in ["a", "b", "c", "d"] {
            ring.push(envelope(id));
        }

        assert_eq!(ids(&ring), vec!["d", "c", "b"]);
    }

    #[test]
    fn test_seed_keeps_newest_entries() {
        let mut ring = HistoryRing::new(2);
        ring.seed(["old", "mid", "new"].into_iter().map(envelope));
        assert_eq!(ids(&ring), vec!["new", "mid"]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut ring = HistoryRing::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.push(envelope("a"));
        ring.push(envelope("b"));
        assert_eq!(ids(&ring), vec!["b"]);
    }

    #[test]
    fn test_sequence_shares_stored_envelopes() {
        let mut ring = HistoryRing::default();
        let original = envelope("a");
        ring.push(Arc::clone(&original));

        let sequence = ring.to_sequence();
        assert!(Arc::ptr_eq(&sequence[0], &original));
        assert!(!ring.is_empty());
        assert_eq!(ring.len(), 1);
    }
}
