// causal order via vector clocks. unlike the sequential scheduler, queue
// order is never consulted by the delivery predicate (the distilled design
// leaves this an open question and explicitly permits it): the loop scans
// every pending entry each wake-up, because readiness is a partial order --
// an entry from sender s can become deliverable while an earlier-enqueued
// entry from sender t still isn't.
//
// the predicate itself -- "is every dependency satisfied by what we've
// already seen" -- is the same shape as `cops::Server`'s `deps` check on
// `Put`, just restated over one counter per sender instead of one version
// per key.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use replistore_messages::{Mode, NodeId, WriteReqBcast};

use crate::{clock::VectorClock, net::peer::PeerNet, store::Store};

struct Entry {
    sender: NodeId,
    vts: VectorClock,
    key: String,
    value: String,
}

struct Inner {
    local: VectorClock,
    queue: Vec<Entry>,
}

pub struct CausalScheduler<N> {
    node: NodeId,
    cluster_size: usize,
    inner: Mutex<Inner>,
    notify: Notify,
    net: Arc<N>,
    store: Store,
}

impl<N: PeerNet> CausalScheduler<N> {
    pub fn new(node: NodeId, cluster_size: usize, net: Arc<N>, store: Store) -> Self {
        Self {
            node,
            cluster_size,
            inner: Mutex::new(Inner {
                local: VectorClock::zero(node, cluster_size),
                queue: Default::default(),
            }),
            notify: Notify::new(),
            net,
            store,
        }
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    /// A locally-issued write: increments this node's own component, applies
    /// to the store immediately (causal order self-to-self is trivially
    /// satisfied, so there's nothing to queue), then fans the broadcast out
    /// to every *other* peer stamped with the new vector.
    pub async fn issue_local(&self, key: String, value: String) {
        let vts = {
            let mut inner = self.inner.lock().await;
            inner.local.increment_self();
            inner.local.clone()
        };
        self.store.put(key.clone(), value.clone()).await;
        self.net.broadcast_write(
            WriteReqBcast {
                mode: Mode::Causal,
                sender: self.node,
                sender_clock: None,
                vts: Some(vts.counters.clone()),
                key,
                value,
            },
            false,
        );
    }

    /// A remote broadcast-write. Drops self-originated echoes (already
    /// applied synchronously by `issue_local`) and stale/duplicate
    /// broadcasts (`vts[sender] <= local[sender]`, which the predicate could
    /// never satisfy again) so they don't stall the queue forever.
    pub async fn enqueue(&self, sender: NodeId, vts: VectorClock, key: String, value: String) {
        if sender == self.node {
            debug!("dropping self-originated broadcast-write echo");
            return;
        }
        {
            let mut inner = self.inner.lock().await;
            if vts.component(sender) <= inner.local.component(sender) {
                warn!(sender, "dropping duplicate or stale causal broadcast-write");
                return;
            }
            inner.queue.push(Entry {
                sender,
                vts,
                key,
                value,
            });
        }
        self.notify.notify_one();
    }

    pub async fn run(self: Arc<Self>) {
        loop {
            if self.try_deliver_one().await {
                continue; // another entry further down the queue may now be ready
            }
            self.notify.notified().await;
        }
    }

    /// Drives delivery synchronously until a full scan finds nothing ready,
    /// instead of parking on `notify` forever. Used by tests driving a fixed
    /// sequence of enqueues.
    pub async fn drain(&self) {
        while self.try_deliver_one().await {}
    }

    /// `ifAllowDeliver` scanned over every pending entry, applied to the
    /// first match found. Returns whether anything was delivered.
    async fn try_deliver_one(&self) -> bool {
        let delivered = {
            let mut inner = self.inner.lock().await;
            let local = inner.local.clone();
            let index = inner.queue.iter().position(|entry| Self::allow_deliver(&local, entry));
            index.map(|i| {
                let entry = inner.queue.remove(i);
                inner.local.merge_max(&entry.vts);
                entry
            })
        };
        match delivered {
            Some(entry) => {
                debug!(sender = entry.sender, "delivered");
                self.store.put(entry.key, entry.value).await;
                true
            }
            None => false,
        }
    }

    fn allow_deliver(local: &VectorClock, entry: &Entry) -> bool {
        if entry.vts.component(entry.sender) != local.component(entry.sender) + 1 {
            return false;
        }
        (0..local.counters.len() as NodeId)
            .filter(|&k| k != entry.sender)
            .all(|k| entry.vts.component(k) <= local.component(k))
    }
}
