// logical clocks: the scalar (Lamport) timestamp used by `SequentialScheduler`
// and the vector timestamp used by `CausalScheduler`.
//
// both share the same two operations in spirit -- advance on a local event,
// merge on a remote one -- but only the scalar clock has a total order, so
// they don't share a single trait for that part. `Clock` below only captures
// the "arbitrary total ordering that breaks ties" piece that the sequential
// scheduler's priority queue needs; see lamport_mutex's `Clock` in the
// teacher crate for the idea this is lifted from.

use std::cmp::Ordering;

use replistore_messages::NodeId;
use serde::{Deserialize, Serialize};

pub trait Clock: Clone + Send + Sync + 'static {
    fn arbitrary_cmp(&self, other: &Self) -> Ordering;
}

impl<C: Ord + Clone + Send + Sync + 'static> Clock for C {
    fn arbitrary_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

/// `(counter, nodeId)`, totally ordered with ties broken by node id. Field
/// declaration order doubles as the derived comparator, so this also works
/// directly as a `BTreeMap` key for the sequential priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScalarClock {
    pub counter: u64,
    pub node: NodeId,
}

impl ScalarClock {
    pub fn zero(node: NodeId) -> Self {
        Self { counter: 0, node }
    }

    /// IR2(a): the sending of a message is stamped with the incremented
    /// local counter.
    pub fn increment(&mut self) {
        self.counter += 1;
    }

    /// IR2(b): on receiving a message timestamped `sender_counter`, the
    /// local counter becomes `max(local, sender_counter) + 1`.
    pub fn merge_and_increment(&mut self, sender_counter: u64) {
        self.counter = self.counter.max(sender_counter) + 1;
    }
}

/// Length-`N` vector of per-node counters plus this node's own id. Partial
/// order only: `v <= w` iff every component of `v` is `<=` the matching
/// component of `w`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock {
    pub counters: Vec<u64>,
    pub node: NodeId,
}

impl VectorClock {
    pub fn zero(node: NodeId, cluster_size: usize) -> Self {
        Self {
            counters: vec![0; cluster_size],
            node,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.counters.iter().all(|&c| c == 0)
    }

    pub fn component(&self, node: NodeId) -> u64 {
        self.counters[node as usize]
    }

    /// Increments this node's own component, used when a local write is
    /// issued.
    pub fn increment_self(&mut self) {
        self.counters[self.node as usize] += 1;
    }

    /// Componentwise `max`, raising every component toward `other`'s.
    pub fn merge_max(&mut self, other: &VectorClock) {
        for (mine, theirs) in self.counters.iter_mut().zip(&other.counters) {
            *mine = (*mine).max(*theirs);
        }
    }
}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.counters.len() != other.counters.len() {
            return None;
        }
        let mut less = false;
        let mut greater = false;
        for (a, b) in self.counters.iter().zip(&other.counters) {
            match a.cmp(b) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
        }
        match (less, greater) {
            (true, true) => None,
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => Some(Ordering::Equal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scalar_counter_never_decreases_on_increment() {
        let mut c = ScalarClock::zero(0);
        let mut last = c.counter;
        for _ in 0..100 {
            c.increment();
            assert!(c.counter > last);
            last = c.counter;
        }
    }

    proptest! {
        #[test]
        fn scalar_merge_and_increment_exceeds_sender(local in 0u64..1000, sender in 0u64..1000) {
            let mut c = ScalarClock { counter: local, node: 0 };
            c.merge_and_increment(sender);
            prop_assert!(c.counter >= sender + 1);
            prop_assert!(c.counter > local || local < sender + 1);
        }

        #[test]
        fn vector_merge_max_is_idempotent(a in proptest::collection::vec(0u64..50, 3), b in proptest::collection::vec(0u64..50, 3)) {
            let mut v1 = VectorClock { counters: a.clone(), node: 0 };
            let v2 = VectorClock { counters: b, node: 1 };
            v1.merge_max(&v2);
            let once = v1.clone();
            v1.merge_max(&v2);
            prop_assert_eq!(once, v1);
        }
    }

    #[test]
    fn vector_partial_order_examples() {
        let v = |c: &[u64]| VectorClock { counters: c.to_vec(), node: 0 };
        assert_eq!(v(&[1, 0]).partial_cmp(&v(&[1, 0])), Some(Ordering::Equal));
        assert_eq!(v(&[1, 0]).partial_cmp(&v(&[2, 0])), Some(Ordering::Less));
        assert_eq!(v(&[1, 1]).partial_cmp(&v(&[1, 0])), Some(Ordering::Greater));
        assert_eq!(v(&[1, 0]).partial_cmp(&v(&[0, 1])), None);
    }
}
