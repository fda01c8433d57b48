//! Replication Subsystem
//!
//! Primary/replica execution of a single request across a shard's
//! replication group:
//! - The primary is assigned externally and must succeed first
//! - Replicas are contacted concurrently, each independently
//! - A replica that fails or cannot be reached is demoted, not retried
//! - The outcome is published exactly once as `ShardInfo`
//!
//! Not a consensus protocol: no election, no log, no rollback of replicas
//! that did succeed.

mod config;
mod errors;
mod operation;
mod phase;
mod request;
mod response;
mod roles;
mod set_once;
mod tally;

pub use config::ReplicationConfig;
pub use errors::{ReplicationError, ReplicationErrorKind, ReplicationResult};
pub use operation::ReplicationOperation;
pub use phase::OperationPhase;
pub use request::{PrimaryResult, ReplicationRequest};
pub use response::{ConcreteShardRequest, ReplicaResponse, ShardFailure, ShardInfo, UNASSIGNED_SEQ_NO};
pub use roles::{Primary, Replicas};
pub use set_once::SetOnce;
