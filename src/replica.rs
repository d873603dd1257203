//! Glue between the wire protocol and the two schedulers: the three RPC
//! entry points transport glue calls into (`onClientWrite`, `onBroadcastWrite`,
//! `onAck`), plus the worker's own store handle. A worker hosts exactly one
//! `Replica`, which holds one instance of each scheduler variant side by
//! side -- selection between them happens per-request via `Mode`.

use std::sync::Arc;

use replistore_messages::{AckReq, AckResp, BcastResp, Mode, NodeId, WriteReqBcast, WriteResp};
use tracing::warn;

use crate::{
    clock::{ScalarClock, VectorClock},
    net::peer::PeerNet,
    scheduler::{causal::CausalScheduler, sequential::SequentialScheduler},
    store::Store,
};

pub struct Replica<N> {
    node_id: NodeId,
    net: Arc<N>,
    sequential: Arc<SequentialScheduler<N>>,
    causal: Arc<CausalScheduler<N>>,
    store: Store,
}

impl<N: PeerNet> Replica<N> {
    pub fn new(node_id: NodeId, cluster_size: usize, net: Arc<N>) -> Self {
        let store = Store::new();
        Self {
            node_id,
            sequential: Arc::new(SequentialScheduler::new(
                node_id,
                cluster_size,
                net.clone(),
                store.clone(),
            )),
            causal: Arc::new(CausalScheduler::new(
                node_id,
                cluster_size,
                net.clone(),
                store.clone(),
            )),
            net,
            store,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Spawns both schedulers' delivery loops on the current runtime. A
    /// worker keeps both alive regardless of which mode any given write
    /// uses, since the mode is selected per-request, not per-process.
    pub fn spawn_delivery_loops(&self) {
        tokio::spawn(self.sequential.clone().run());
        tokio::spawn(self.causal.clone().run());
    }

    pub async fn on_client_write(&self, mode: Mode, key: String, value: String) -> WriteResp {
        match mode {
            Mode::Sequential => {
                let ts = self.sequential.increment_and_get_timestamp().await;
                self.net.broadcast_write(
                    WriteReqBcast {
                        mode,
                        sender: self.node_id,
                        sender_clock: Some(ts.counter),
                        vts: None,
                        key,
                        value,
                    },
                    true,
                );
            }
            Mode::Causal => self.causal.issue_local(key, value).await,
        }
        WriteResp {
            receiver: self.node_id,
            status: 0,
        }
    }

    pub async fn on_broadcast_write(&self, req: WriteReqBcast) -> anyhow::Result<BcastResp> {
        match req.mode {
            Mode::Sequential => {
                let Some(sender_clock) = req.sender_clock else {
                    warn!(sender = req.sender, "rejecting sequential broadcast-write: missing senderClock");
                    return Err(anyhow::anyhow!("sequential broadcast-write missing senderClock"));
                };
                self.sequential
                    .update_and_increment_timestamp(sender_clock)
                    .await;
                self.sequential
                    .enqueue(
                        ScalarClock {
                            counter: sender_clock,
                            node: req.sender,
                        },
                        req.sender,
                        req.key,
                        req.value,
                    )
                    .await;
            }
            Mode::Causal => {
                let Some(counters) = req.vts else {
                    warn!(sender = req.sender, "rejecting causal broadcast-write: missing vts");
                    return Err(anyhow::anyhow!("causal broadcast-write missing vts"));
                };
                if counters.len() != self.causal.cluster_size() {
                    warn!(
                        sender = req.sender,
                        len = counters.len(),
                        expected = self.causal.cluster_size(),
                        "rejecting causal broadcast-write: vector clock length mismatch"
                    );
                    anyhow::bail!(
                        "vector clock length {} does not match cluster size {}",
                        counters.len(),
                        self.causal.cluster_size()
                    );
                }
                let vts = VectorClock {
                    counters,
                    node: req.sender,
                };
                self.causal
                    .enqueue(req.sender, vts, req.key, req.value)
                    .await;
            }
        }
        Ok(BcastResp {
            receiver: self.node_id,
            status: 0,
        })
    }

    pub async fn on_ack(&self, req: AckReq) -> anyhow::Result<AckResp> {
        if !matches!(req.mode, Mode::Sequential) {
            warn!(sender = req.sender, "rejecting ack: mode is not sequential");
            anyhow::bail!("ack received for a non-sequential mode");
        }
        self.sequential
            .update_and_increment_timestamp(req.sender_clock)
            .await;
        self.sequential
            .update_ack(
                ScalarClock {
                    counter: req.clock,
                    node: req.id,
                },
                req.sender,
            )
            .await;
        Ok(AckResp {
            receiver: self.node_id,
            status: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::peer::RecordingPeerNet;

    fn replica(node_id: NodeId, cluster_size: usize) -> Arc<Replica<RecordingPeerNet>> {
        Arc::new(Replica::new(
            node_id,
            cluster_size,
            Arc::new(RecordingPeerNet::new(node_id, cluster_size)),
        ))
    }

    // spec.md §8 scenario 1: two-node sequential total order.
    #[tokio::test]
    async fn two_node_sequential_total_order() {
        let node0 = replica(0, 2);
        let node1 = replica(1, 2);

        node0
            .on_client_write(Mode::Sequential, "x".into(), "1".into())
            .await;
        node1
            .on_client_write(Mode::Sequential, "y".into(), "2".into())
            .await;

        // deliver node 0's write (1.0) to both replicas, then node 1's (1.1).
        let write_x = WriteReqBcast {
            mode: Mode::Sequential,
            sender: 0,
            sender_clock: Some(1),
            vts: None,
            key: "x".into(),
            value: "1".into(),
        };
        let write_y = WriteReqBcast {
            mode: Mode::Sequential,
            sender: 1,
            sender_clock: Some(1),
            vts: None,
            key: "y".into(),
            value: "2".into(),
        };
        for node in [&node0, &node1] {
            node.on_broadcast_write(write_x.clone()).await.unwrap();
            node.on_broadcast_write(write_y.clone()).await.unwrap();
        }
        // every peer (including self) acks every message.
        for node in [&node0, &node1] {
            for sender in 0..2 {
                node.on_ack(AckReq {
                    mode: Mode::Sequential,
                    sender,
                    sender_clock: 1,
                    clock: 1,
                    id: 0,
                })
                .await
                .unwrap();
                node.on_ack(AckReq {
                    mode: Mode::Sequential,
                    sender,
                    sender_clock: 1,
                    clock: 1,
                    id: 1,
                })
                .await
                .unwrap();
            }
        }
        node0.sequential.drain().await;
        node1.sequential.drain().await;

        for node in [&node0, &node1] {
            assert_eq!(node.store().get("x").await, Some("1".into()));
            assert_eq!(node.store().get("y").await, Some("2".into()));
        }
    }

    // spec.md §8 scenario 4: causal basic, two writes across two nodes.
    #[tokio::test]
    async fn causal_basic_cross_node_delivery() {
        let node0 = replica(0, 2);
        let node1 = replica(1, 2);

        node0
            .on_client_write(Mode::Causal, "x".into(), "a".into())
            .await;
        assert_eq!(node0.store().get("x").await, Some("a".into()));
        node1
            .on_broadcast_write(WriteReqBcast {
                mode: Mode::Causal,
                sender: 0,
                sender_clock: None,
                vts: Some(vec![1, 0]),
                key: "x".into(),
                value: "a".into(),
            })
            .await
            .unwrap();
        node1.causal.drain().await;
        assert_eq!(node1.store().get("x").await, Some("a".into()));

        node1
            .on_client_write(Mode::Causal, "y".into(), "b".into())
            .await;
        node0
            .on_broadcast_write(WriteReqBcast {
                mode: Mode::Causal,
                sender: 1,
                sender_clock: None,
                vts: Some(vec![1, 1]),
                key: "y".into(),
                value: "b".into(),
            })
            .await
            .unwrap();
        node0.causal.drain().await;
        assert_eq!(node0.store().get("y").await, Some("b".into()));
    }

    #[tokio::test]
    async fn rejects_mismatched_vector_length() {
        let node = replica(0, 2);
        let err = node
            .on_broadcast_write(WriteReqBcast {
                mode: Mode::Causal,
                sender: 1,
                sender_clock: None,
                vts: Some(vec![1, 0, 0]),
                key: "x".into(),
                value: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("vector clock length"));
    }
}
