// total sequential order via Lamport scalar clocks plus ack-counting.
//
// the "fire the ack broadcast exactly once" rule is promoted from the
// distilled design's loose `bcastAckTask` + `bcastCount` fields into an
// explicit per-entry state tag (`Enqueued` -> `AcksRequested`), so the
// invariant is local to one match arm instead of implied by two mutable
// fields -- the same kind of explicit request/ack tracking `requesting`
// plays for `lamport_mutex::Processor`.

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use replistore_messages::{AckReq, Mode, NodeId};

use crate::{ack_table::AckTable, clock::ScalarClock, net::peer::PeerNet, store::Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryState {
    Enqueued,
    AcksRequested,
}

#[derive(Debug)]
struct Entry {
    origin: NodeId,
    key: String,
    value: String,
    state: DeliveryState,
}

/// Outcome of one delivery-loop pass, used only to decide whether to loop
/// again immediately or park on `notify`.
enum Pass {
    Delivered,
    FiredAcks,
    Idle,
}

#[derive(Debug)]
pub struct SequentialScheduler<N> {
    node: NodeId,
    clock: Mutex<ScalarClock>,
    queue: Mutex<BTreeMap<ScalarClock, Entry>>,
    acks: AckTable,
    notify: Notify,
    net: Arc<N>,
    store: Store,
}

impl<N: PeerNet> SequentialScheduler<N> {
    pub fn new(node: NodeId, cluster_size: usize, net: Arc<N>, store: Store) -> Self {
        Self {
            node,
            clock: Mutex::new(ScalarClock::zero(node)),
            queue: Default::default(),
            acks: AckTable::new(cluster_size),
            notify: Notify::new(),
            net,
            store,
        }
    }

    /// Stamps and returns a new local write, for use when a client write is
    /// issued locally (before its own broadcast-write fan-out).
    pub async fn increment_and_get_timestamp(&self) -> ScalarClock {
        let mut clock = self.clock.lock().await;
        clock.increment();
        *clock
    }

    /// Folds a remote stamp into the local clock: called on every received
    /// broadcast-write or ack, independent of whatever stamp ends up in the
    /// priority queue (the queue is keyed by the *originator's* stamp, not
    /// this node's).
    pub async fn update_and_increment_timestamp(&self, sender_counter: u64) -> ScalarClock {
        let mut clock = self.clock.lock().await;
        clock.merge_and_increment(sender_counter);
        *clock
    }

    /// Enqueues a pending write stamped with its originator's timestamp.
    /// Never blocks on delivery; only briefly takes the queue lock.
    pub async fn enqueue(&self, stamp: ScalarClock, origin: NodeId, key: String, value: String) {
        {
            let mut queue = self.queue.lock().await;
            queue.insert(
                stamp,
                Entry {
                    origin,
                    key,
                    value,
                    state: DeliveryState::Enqueued,
                },
            );
        }
        self.notify.notify_one();
    }

    /// Marks `sender`'s ack slot for `stamp` and wakes the delivery loop.
    pub async fn update_ack(&self, stamp: ScalarClock, sender: NodeId) {
        self.acks.ack((stamp.counter, stamp.node), sender).await;
        self.notify.notify_one();
    }

    /// The dedicated delivery loop. Runs for as long as the scheduler is
    /// kept alive.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.try_advance().await {
                Pass::Delivered | Pass::FiredAcks => continue,
                Pass::Idle => self.notify.notified().await,
            }
        }
    }

    /// Drives the loop's logic synchronously until it makes no further
    /// progress, instead of parking on `notify` forever. Used by tests that
    /// drive a fixed sequence of enqueues/acks and want delivery effects
    /// applied deterministically rather than racing a spawned `run` task.
    pub async fn drain(&self) {
        loop {
            if matches!(self.try_advance().await, Pass::Idle) {
                return;
            }
        }
    }

    /// `ifAllowDeliver` plus its side effects, folded into one pass: peek
    /// the head, request acks on first sight, deliver once the bitmap is
    /// complete. Returns what happened so `run` knows whether to loop
    /// immediately (more work might be ready) or park.
    async fn try_advance(&self) -> Pass {
        let head_stamp = match self.queue.lock().await.keys().next().copied() {
            Some(stamp) => stamp,
            None => return Pass::Idle,
        };
        let id = (head_stamp.counter, head_stamp.node);

        let should_request_acks = {
            let mut queue = self.queue.lock().await;
            match queue.get_mut(&head_stamp) {
                Some(entry) if entry.state == DeliveryState::Enqueued => {
                    entry.state = DeliveryState::AcksRequested;
                    true
                }
                _ => false,
            }
        };
        if should_request_acks {
            let sender_clock = self.clock.lock().await.counter;
            self.net.broadcast_ack(AckReq {
                mode: Mode::Sequential,
                sender: self.node,
                sender_clock,
                clock: head_stamp.counter,
                id: head_stamp.node,
            });
            debug!(?head_stamp, "requested acks for queue head");
            return Pass::FiredAcks;
        }

        if !self.acks.is_complete(id).await {
            return Pass::Idle;
        }

        // re-check head identity: the lock was released between the
        // emptiness check above and here, so another pass (or a concurrent
        // enqueue with a smaller stamp, impossible for a correct sender but
        // not worth assuming away) could have changed it.
        let entry = {
            let mut queue = self.queue.lock().await;
            match queue.keys().next() {
                Some(stamp) if *stamp == head_stamp => queue.remove(&head_stamp),
                _ => None,
            }
        };
        let Some(entry) = entry else {
            return Pass::Idle;
        };
        self.store.put(entry.key, entry.value).await;
        self.acks.reap(id).await;
        debug!(?head_stamp, origin = entry.origin, "delivered");
        Pass::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::peer::RecordingPeerNet;

    fn scheduler(node: NodeId, cluster_size: usize) -> Arc<SequentialScheduler<RecordingPeerNet>> {
        Arc::new(SequentialScheduler::new(
            node,
            cluster_size,
            Arc::new(RecordingPeerNet::new(node, cluster_size)),
            Store::new(),
        ))
    }

    #[tokio::test]
    async fn requests_acks_exactly_once_then_waits() {
        let sched = scheduler(0, 2);
        sched
            .enqueue(ScalarClock { counter: 1, node: 0 }, 0, "x".into(), "1".into())
            .await;

        assert!(matches!(sched.try_advance().await, Pass::FiredAcks));
        // already requested: sitting at the head again should just block,
        // not request a second time.
        assert!(matches!(sched.try_advance().await, Pass::Idle));
        assert_eq!(sched.net.acks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delivers_only_after_full_bitmap_and_head_position() {
        let sched = scheduler(2, 3);
        let stamp = ScalarClock { counter: 5, node: 0 };
        sched.enqueue(stamp, 0, "x".into(), "1".into()).await;
        assert!(matches!(sched.try_advance().await, Pass::FiredAcks));

        // acks out of order: node 1, then node 0, then self (node 2) last.
        sched.update_ack(stamp, 1).await;
        assert!(matches!(sched.try_advance().await, Pass::Idle));
        sched.update_ack(stamp, 0).await;
        assert!(matches!(sched.try_advance().await, Pass::Idle));
        sched.update_ack(stamp, 2).await;
        assert!(matches!(sched.try_advance().await, Pass::Delivered));
        assert_eq!(sched.store.get("x").await, Some("1".into()));
    }

    #[tokio::test]
    async fn head_of_line_blocking_by_tie_broken_node_id() {
        let sched = scheduler(0, 2);
        let low = ScalarClock { counter: 3, node: 0 };
        let high = ScalarClock { counter: 3, node: 1 };
        sched.enqueue(low, 0, "x".into(), "1".into()).await;
        sched.enqueue(high, 1, "x".into(), "2".into()).await;

        // request acks for the true head (low) first.
        assert!(matches!(sched.try_advance().await, Pass::FiredAcks));
        // complete the *later* record's bitmap first.
        sched.update_ack(high, 0).await;
        sched.update_ack(high, 1).await;
        // it must not be delivered: it isn't head, and hasn't even had its
        // own acks requested yet (still stuck behind `low`).
        assert!(matches!(sched.try_advance().await, Pass::Idle));
        assert_eq!(sched.store.get("x").await, None);

        sched.update_ack(low, 0).await;
        sched.update_ack(low, 1).await;
        assert!(matches!(sched.try_advance().await, Pass::Delivered));
        assert_eq!(sched.store.get("x").await, Some("1".into()));
        assert!(matches!(sched.try_advance().await, Pass::FiredAcks));
        assert!(matches!(sched.try_advance().await, Pass::Delivered));
        assert_eq!(sched.store.get("x").await, Some("2".into()));
    }
}
