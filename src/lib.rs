//! `replistore`: a small replicated key-value store whose engineering weight
//! sits in the delivery-ordering layer, not the storage. Every write is
//! replicated to every peer; each peer applies writes in an order that
//! satisfies whichever consistency discipline the write asked for --
//! sequential (Lamport scalar clocks + ack-counting) or causal (vector
//! clocks). See [`scheduler`] for the two scheduler variants that implement
//! this, [`clock`] for the timestamp types they're built on, and [`replica`]
//! for the glue that wires incoming RPCs to them.

pub mod ack_table;
pub mod clock;
pub mod net;
pub mod replica;
pub mod scheduler;
pub mod store;
