//! Property-based tests for the queue and backoff invariants.
//!
//! proptest generates arbitrary workloads and verifies the invariants the
//! rest of the client leans on: the bounded ring never exceeds capacity and
//! always evicts oldest-first, prioritization is a stable partition, and
//! the backoff curve is monotonic with bounded jitter.

use gatenode_core::BoundedRing;
use gatenode_net::RetryPolicy;
use gatenode_net::retry::backoff_delay;
use proptest::prelude::*;
use std::time::Duration;

/// Strategy for ring capacities in the range the client actually uses.
fn capacity() -> impl Strategy<Value = usize> {
    1usize..=64
}

/// Strategy for an entry stream: (id, critical) pairs.
fn entries() -> impl Strategy<Value = Vec<(u32, bool)>> {
    prop::collection::vec((any::<u32>(), any::<bool>()), 0..200)
}

proptest! {
    #[test]
    fn ring_never_exceeds_capacity(cap in capacity(), items in entries()) {
        let mut ring = BoundedRing::new(cap);
        for item in items {
            ring.push(item);
            prop_assert!(ring.len() <= cap);
        }
    }

    #[test]
    fn ring_evicts_oldest_first(cap in capacity(), items in entries()) {
        let mut ring = BoundedRing::new(cap);
        for item in &items {
            ring.push(*item);
        }
        // Survivors are exactly the newest `cap` entries, in order.
        let expected: Vec<(u32, bool)> = items
            .iter()
            .skip(items.len().saturating_sub(cap))
            .copied()
            .collect();
        let actual: Vec<(u32, bool)> = ring.iter().copied().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prioritize_is_stable_partition(cap in capacity(), items in entries()) {
        let mut ring = BoundedRing::new(cap);
        for item in &items {
            ring.push(*item);
        }
        let before: Vec<(u32, bool)> = ring.iter().copied().collect();

        ring.stable_partition_by(|(_, critical)| *critical);
        let after: Vec<(u32, bool)> = ring.iter().copied().collect();

        // Same entries, critical block first, relative order preserved
        // within each class.
        let boundary = after.iter().take_while(|(_, c)| *c).count();
        prop_assert!(after[boundary..].iter().all(|(_, c)| !c));

        let criticals: Vec<_> = before.iter().filter(|(_, c)| *c).copied().collect();
        let routine: Vec<_> = before.iter().filter(|(_, c)| !c).copied().collect();
        prop_assert_eq!(&after[..boundary], &criticals[..]);
        prop_assert_eq!(&after[boundary..], &routine[..]);
    }

    #[test]
    fn backoff_doubles_and_never_shrinks(attempt in 0u32..12) {
        let policy = RetryPolicy::default();
        let current = backoff_delay(&policy, attempt, 0);
        let next = backoff_delay(&policy, attempt + 1, 0);
        prop_assert!(next >= current);
        prop_assert_eq!(next.as_millis(), current.as_millis() * 2);
    }

    #[test]
    fn backoff_jitter_stays_bounded(attempt in 0u32..12, jitter in -100i64..=100) {
        let policy = RetryPolicy::default();
        let base = backoff_delay(&policy, attempt, 0);
        let jittered = backoff_delay(&policy, attempt, jitter);

        let min = base.saturating_sub(Duration::from_millis(100));
        let max = base + Duration::from_millis(100);
        prop_assert!(jittered >= min.max(policy.min_delay));
        prop_assert!(jittered <= max);
    }

    #[test]
    fn backoff_respects_floor(jitter in -100_000i64..0) {
        let policy = RetryPolicy::default();
        let delay = backoff_delay(&policy, 0, jitter);
        prop_assert!(delay >= policy.min_delay);
    }
}
