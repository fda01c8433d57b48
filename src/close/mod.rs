//! Verify Shard Before Close
//!
//! Last step on the shard level before an index is closed. Every in-sync
//! copy must prove it is idle, blocked against writes, consistent and
//! durably flushed. Copies that cannot are dropped from the in-sync set;
//! the close proceeds as long as the primary passed.

mod action;
mod local;
mod primary;
mod proxy;
mod request;

pub use action::{VerifyShardBeforeCloseAction, NAME, PRIMARY_ACTION_NAME, REPLICA_ACTION_NAME};
pub use local::LocalReplicas;
pub use primary::PrimaryShardReference;
pub use proxy::ReplicasProxy;
pub use request::ShardRequest;
