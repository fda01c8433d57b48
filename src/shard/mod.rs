//! Shard Storage Handle
//!
//! The narrow interface through which the close protocol touches a local
//! shard copy: the in-flight operation counter, the engine-level
//! consistency check, and a durable flush. The storage engine behind it is
//! external; `MemoryShard` stands in for it in tests and simulations.

mod errors;
mod handle;
mod memory;

pub use errors::{ShardError, ShardResult};
pub use handle::{CommitId, FlushRequest, IndexShard};
pub use memory::MemoryShard;
