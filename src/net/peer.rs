// peer fan-out: one spawned task per peer, so a single slow or unreachable
// peer never serializes the rest of a broadcast. modeled directly on
// `net::session::Udp::send` in the teacher crate, which spawns one task per
// outbound datagram and has no way to observe the send's outcome -- by
// definition broadcast here is a one-way, best-effort send, and failures are
// logged and dropped rather than surfaced to the caller.

use std::sync::Mutex;

use replistore_messages::{AckReq, NodeId, WriteReqBcast};
use tracing::warn;

/// Fan-out abstraction the schedulers broadcast through. Implementations
/// must not block the caller on completion of the RPCs they launch.
pub trait PeerNet: Send + Sync + 'static {
    /// Sends `req` to every peer, optionally including this node itself
    /// (sequential mode loops its own broadcast-write back through the
    /// ordinary RPC path; causal mode applies locally instead and excludes
    /// self here).
    fn broadcast_write(&self, req: WriteReqBcast, include_self: bool);

    /// Sends `req` to every peer, including this node itself -- sequential
    /// mode only.
    fn broadcast_ack(&self, req: AckReq);
}

#[derive(Debug, Clone)]
pub struct HttpPeerNet {
    node_id: NodeId,
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl HttpPeerNet {
    pub fn new(node_id: NodeId, endpoints: Vec<String>) -> Self {
        Self {
            node_id,
            endpoints,
            client: reqwest::Client::new(),
        }
    }

    fn targets(&self, include_self: bool) -> impl Iterator<Item = (NodeId, &str)> {
        self.endpoints.iter().enumerate().filter_map(move |(i, endpoint)| {
            let peer = i as NodeId;
            (include_self || peer != self.node_id).then_some((peer, endpoint.as_str()))
        })
    }
}

impl PeerNet for HttpPeerNet {
    fn broadcast_write(&self, req: WriteReqBcast, include_self: bool) {
        for (peer, endpoint) in self.targets(include_self) {
            let client = self.client.clone();
            let url = format!("{endpoint}/bcast-write");
            let req = req.clone();
            tokio::spawn(async move {
                if let Err(err) = client.post(url).json(&req).send().await {
                    warn!(peer, %err, "broadcast-write RPC failed");
                }
            });
        }
    }

    fn broadcast_ack(&self, req: AckReq) {
        for (peer, endpoint) in self.targets(true) {
            let client = self.client.clone();
            let url = format!("{endpoint}/ack");
            let req = req.clone();
            tokio::spawn(async move {
                if let Err(err) = client.post(url).json(&req).send().await {
                    warn!(peer, %err, "ack RPC failed");
                }
            });
        }
    }
}

/// Test double that records fan-out calls instead of making RPCs. Scheduler
/// and handler tests drive peers' `on_broadcast_write`/`on_ack` directly in
/// whatever interleaving a scenario calls for, so nothing here needs to
/// actually deliver anything.
#[derive(Debug, Default)]
pub struct RecordingPeerNet {
    node_id: NodeId,
    cluster_size: usize,
    pub writes: Mutex<Vec<(WriteReqBcast, bool)>>,
    pub acks: Mutex<Vec<AckReq>>,
}

impl RecordingPeerNet {
    pub fn new(node_id: NodeId, cluster_size: usize) -> Self {
        Self {
            node_id,
            cluster_size,
            writes: Default::default(),
            acks: Default::default(),
        }
    }
}

impl PeerNet for RecordingPeerNet {
    fn broadcast_write(&self, req: WriteReqBcast, include_self: bool) {
        self.writes.lock().unwrap().push((req, include_self));
    }

    fn broadcast_ack(&self, req: AckReq) {
        self.acks.lock().unwrap().push(req);
    }
}
