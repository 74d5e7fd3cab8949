//! Fixed-capacity ring buffer with evict-oldest overflow.
//!
//! Both the offline queue and the diagnostics log are bounded FIFOs that
//! prefer fresh data over completeness. This wrapper replaces manual
//! head/count modulo arithmetic with a bounds-checked container so the
//! off-by-one class of bugs cannot exist.

use std::collections::VecDeque;

/// Bounded FIFO ring.
///
/// Pushing into a full ring evicts the oldest entry and returns it to the
/// caller, which decides whether the eviction is worth logging.
///
/// # Examples
///
/// ```
/// use gatenode_core::BoundedRing;
///
/// let mut ring = BoundedRing::new(2);
/// assert_eq!(ring.push(1), None);
/// assert_eq!(ring.push(2), None);
/// assert_eq!(ring.push(3), Some(1)); // oldest evicted
/// assert_eq!(ring.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedRing<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedRing<T> {
    /// Create a ring with the given capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero; a zero-capacity ring cannot hold the
    /// entry being pushed and has no sensible eviction semantics.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting and returning the oldest one when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.buf.len() == self.capacity {
            self.buf.pop_front()
        } else {
            None
        };
        self.buf.push_back(item);
        evicted
    }

    /// Remove and return the oldest entry.
    pub fn pop_front(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    /// Borrow the oldest entry.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.buf.front()
    }

    /// Mutably borrow the oldest entry.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.buf.front_mut()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the ring holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Whether the next push would evict.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest-first; reversible for newest-first views.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.buf.iter()
    }

    /// Iterate oldest-first with mutable access.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.buf.iter_mut()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Stable-partition the ring so entries matching `pred` come first.
    ///
    /// Relative order is preserved within both partitions. A homogeneous
    /// ring (all matching or none matching) is left untouched.
    pub fn stable_partition_by<F>(&mut self, pred: F)
    where
        F: Fn(&T) -> bool,
    {
        if self.buf.iter().all(&pred) || !self.buf.iter().any(&pred) {
            return;
        }

        let mut matching = VecDeque::with_capacity(self.buf.len());
        let mut rest = VecDeque::new();
        for item in self.buf.drain(..) {
            if pred(&item) {
                matching.push_back(item);
            } else {
                rest.push_back(item);
            }
        }
        matching.append(&mut rest);
        self.buf = matching;
    }

    /// Replace the contents from a vector, truncating oldest-first overflow.
    ///
    /// Used when reloading persisted state: if the stored snapshot somehow
    /// exceeds the configured capacity, only the newest `capacity` entries
    /// survive, matching the evict-oldest policy.
    pub fn restore(&mut self, items: Vec<T>) {
        self.buf.clear();
        let skip = items.len().saturating_sub(self.capacity);
        self.buf.extend(items.into_iter().skip(skip));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity() {
        let mut ring = BoundedRing::new(3);
        assert_eq!(ring.push("a"), None);
        assert_eq!(ring.push("b"), None);
        assert_eq!(ring.len(), 2);
        assert!(!ring.is_full());
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut ring = BoundedRing::new(2);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.push(3), Some(1));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut ring = BoundedRing::new(50);
        for i in 0..200 {
            ring.push(i);
            assert!(ring.len() <= 50);
        }
        assert_eq!(ring.len(), 50);
        assert_eq!(ring.front(), Some(&150));
    }

    #[test]
    fn test_pop_front_fifo_order() {
        let mut ring = BoundedRing::new(4);
        for i in 0..4 {
            ring.push(i);
        }
        assert_eq!(ring.pop_front(), Some(0));
        assert_eq!(ring.pop_front(), Some(1));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_iter_reverses_to_newest_first() {
        let mut ring = BoundedRing::new(3);
        for i in 0..3 {
            ring.push(i);
        }
        assert_eq!(ring.iter().rev().copied().collect::<Vec<_>>(), vec![2, 1, 0]);
    }

    #[test]
    fn test_stable_partition() {
        let mut ring = BoundedRing::new(8);
        for item in ["A!", "B", "C!", "D"] {
            ring.push(item);
        }
        ring.stable_partition_by(|s| s.ends_with('!'));
        assert_eq!(
            ring.iter().copied().collect::<Vec<_>>(),
            vec!["A!", "C!", "B", "D"]
        );
    }

    #[test]
    fn test_stable_partition_homogeneous_is_noop() {
        let mut ring = BoundedRing::new(4);
        for i in 0..3 {
            ring.push(i);
        }
        let before: Vec<_> = ring.iter().copied().collect();
        ring.stable_partition_by(|_| true);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), before);
        ring.stable_partition_by(|_| false);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_restore_truncates_oldest() {
        let mut ring = BoundedRing::new(3);
        ring.restore(vec![1, 2, 3, 4, 5]);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_capacity_panics() {
        let _ring: BoundedRing<u8> = BoundedRing::new(0);
    }
}
