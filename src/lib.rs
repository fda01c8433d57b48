//! closeguard - verify shard copies before an index is closed
//!
//! Before an index is closed, every in-sync copy of each of its shards
//! must show it has no operations in flight, that the index is blocked
//! against writes, that its engine is consistent, and that its data is
//! durably flushed. The primary runs the checks first; replicas follow
//! concurrently. Replicas that fail or cannot be reached are removed from
//! the in-sync set instead of blocking the close.

pub mod cli;
pub mod close;
pub mod cluster;
pub mod observability;
pub mod replication;
pub mod shard;
pub mod shard_state;
pub mod transport;
