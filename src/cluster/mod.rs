//! Cluster Model
//!
//! Point-in-time views of the cluster that the verify-before-close
//! protocol reads but never mutates:
//! - Shard, node, allocation and task identities
//! - Cluster blocks attached to indices
//! - Shard routing tables and replication groups
//! - Immutable cluster state snapshots and the service that publishes them
//!
//! Membership and routing computation live outside this crate. Everything
//! here is a snapshot handed to an operation when it starts.

mod block;
mod errors;
mod group;
mod ids;
mod routing;
mod state;

pub use block::{ClusterBlock, ClusterBlockLevel, ClusterBlocks, INDEX_CLOSED_BLOCK_ID};
pub use errors::{ClusterError, ClusterResult};
pub use group::ReplicationGroup;
pub use ids::{AllocationId, NodeId, ShardId, TaskId};
pub use routing::{IndexShardRoutingTable, ShardRouting, ShardRoutingState};
pub use state::{ClusterService, ClusterState, ClusterStateBuilder, ClusterStateReader, IndexMetadata};
