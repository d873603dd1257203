//! The delivery-ordering engine: one scheduler variant per consistency
//! discipline, each owning a priority queue of pending writes and a single
//! delivery loop.
//!
//! The two variants don't share a common `Scheduler` trait object -- their
//! queue entries, predicates and delivery side effects differ too much for
//! that to buy anything beyond indirection (the design notes' suggestion to
//! "parameterise scheduler code by the variant" is instead realized by both
//! modules sharing the same shape: an `enqueue` that only ever touches the
//! queue's lock, a `run(self: Arc<Self>)` delivery loop parked on a
//! `tokio::sync::Notify` between wake-ups, mirroring how `lamport_mutex`'s
//! `Clock` trait captures "arbitrary total ordering" as a shared capability
//! without forcing scalar and vector clocks through one type).
//!
//! Both loops never propagate errors to their caller: a broadcast failure is
//! logged by the `PeerNet` implementation and otherwise ignored here, since
//! the protocols themselves have no retry story (see spec's documented
//! liveness limitation: a missing ack stalls the head forever).

pub mod causal;
pub mod sequential;
