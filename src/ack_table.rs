// the sequential scheduler's ack table: which peers have acknowledged which
// message. keyed by `(counter, nodeId)`, matching the `"<counter>.<nodeId>"`
// message identity string from the distilled design -- kept as a structured
// tuple rather than a formatted string, since `scc::HashMap` hashes it just
// as well and there's no wire format to match.

use replistore_messages::NodeId;

pub type MessageId = (u64, NodeId);

/// `scc::HashMap` gives per-bucket locking, so two acks for different
/// messages never contend, and "idempotent on first-observer-wins" entry
/// creation falls out of `entry_async` without an extra table-wide lock.
#[derive(Debug, Default)]
pub struct AckTable {
    bitmaps: scc::HashMap<MessageId, Vec<bool>>,
    cluster_size: usize,
}

impl AckTable {
    pub fn new(cluster_size: usize) -> Self {
        Self {
            bitmaps: Default::default(),
            cluster_size,
        }
    }

    /// Marks `sender`'s slot true for `id`, creating a length-`cluster_size`
    /// all-false bitmap lazily on first touch. Returns a clone of the
    /// bitmap after the update, so the caller can check completeness
    /// without a second lookup under a different lock.
    pub async fn ack(&self, id: MessageId, sender: NodeId) -> Vec<bool> {
        let mut entry = self
            .bitmaps
            .entry_async(id)
            .await
            .or_insert_with(|| vec![false; self.cluster_size]);
        entry.get_mut()[sender as usize] = true;
        entry.get().clone()
    }

    pub async fn is_complete(&self, id: MessageId) -> bool {
        self.bitmaps
            .read_async(&id, |_, bitmap| bitmap.iter().all(|&acked| acked))
            .await
            .unwrap_or(false)
    }

    /// Drops the entry. Called once a record is delivered; correctness
    /// never depends on entries surviving past delivery, only on them not
    /// being dropped before it.
    pub async fn reap(&self, id: MessageId) {
        self.bitmaps.remove_async(&id).await;
    }
}
