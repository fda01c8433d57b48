//! Replication Configuration
//!
//! Immutable after startup. Loaded as part of a larger JSON config; every
//! field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{ReplicationError, ReplicationResult};

/// Timeouts for primary and replica requests and shard-state reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// How long a replica has to answer before it is treated as unreachable
    #[serde(default = "default_replica_timeout_ms")]
    pub replica_timeout_ms: u64,

    /// How long the master has to acknowledge a failed/stale copy report
    #[serde(default = "default_shard_failed_timeout_ms")]
    pub shard_failed_timeout_ms: u64,

    /// How long a coordinating node waits for the primary to finish the
    /// whole operation, replicas included
    #[serde(default = "default_primary_timeout_ms")]
    pub primary_timeout_ms: u64,
}

fn default_replica_timeout_ms() -> u64 {
    60_000
}

fn default_shard_failed_timeout_ms() -> u64 {
    30_000
}

fn default_primary_timeout_ms() -> u64 {
    120_000
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            replica_timeout_ms: default_replica_timeout_ms(),
            shard_failed_timeout_ms: default_shard_failed_timeout_ms(),
            primary_timeout_ms: default_primary_timeout_ms(),
        }
    }
}

impl ReplicationConfig {
    /// Reject zero timeouts: a zero timeout fails every copy immediately.
    pub fn validate(&self) -> ReplicationResult<()> {
        if self.replica_timeout_ms == 0 {
            return Err(ReplicationError::Configuration(
                "replica_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.shard_failed_timeout_ms == 0 {
            return Err(ReplicationError::Configuration(
                "shard_failed_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.primary_timeout_ms < self.replica_timeout_ms {
            return Err(ReplicationError::Configuration(
                "primary_timeout_ms must be >= replica_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn replica_timeout(&self) -> Duration {
        Duration::from_millis(self.replica_timeout_ms)
    }

    pub fn shard_failed_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_failed_timeout_ms)
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ReplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.replica_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: ReplicationConfig = serde_json::from_str("{\"replica_timeout_ms\": 5}").unwrap();
        assert_eq!(config.replica_timeout_ms, 5);
        assert_eq!(config.shard_failed_timeout_ms, 30_000);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ReplicationConfig {
            replica_timeout_ms: 0,
            ..ReplicationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ReplicationError::Configuration(_))));
    }

    #[test]
    fn test_primary_timeout_covers_replicas() {
        let config = ReplicationConfig {
            replica_timeout_ms: 10_000,
            primary_timeout_ms: 5_000,
            ..ReplicationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ReplicationError::Configuration(_))));
        assert_eq!(ReplicationConfig::default().primary_timeout(), Duration::from_secs(120));
    }
}
