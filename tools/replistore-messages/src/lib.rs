//! Wire message types shared between the `worker` and `control` binaries.
//!
//! Field semantics follow the protocol exactly; field ordering is the
//! transport's concern, not the protocol's, so these are plain JSON-friendly
//! structs rather than a hand-rolled binary layout.

use serde::{Deserialize, Serialize};

pub type NodeId = u8;

/// Which consistency discipline a write (or its broadcast/ack) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Sequential,
    Causal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReq {
    pub mode: Mode,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResp {
    pub receiver: NodeId,
    pub status: i32,
}

/// `senderClock` is populated in sequential mode, `vts` in causal mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReqBcast {
    pub mode: Mode,
    pub sender: NodeId,
    pub sender_clock: Option<u64>,
    pub vts: Option<Vec<u64>>,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcastResp {
    pub receiver: NodeId,
    pub status: i32,
}

/// `clock` and `id` identify the message being acknowledged; `sender` /
/// `sender_clock` carry the acker's own identity and logical clock, piggy-
/// backed the same way every other message in the sequential protocol does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckReq {
    pub mode: Mode,
    pub sender: NodeId,
    pub sender_clock: u64,
    pub clock: u64,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResp {
    pub receiver: NodeId,
    pub status: i32,
}

/// Cluster configuration, read once at startup. A worker's id is its index
/// in `workers`; `workers.len()` is `N` and fixed for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub master: String,
    pub workers: Vec<String>,
}

impl ClusterConfig {
    pub fn cluster_size(&self) -> usize {
        self.workers.len()
    }
}
