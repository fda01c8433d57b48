//! Transport errors

use thiserror::Error;

use crate::cluster::NodeId;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection to the node was lost or never established
    #[error("node [{0}] disconnected")]
    Disconnected(NodeId),

    /// No response arrived in time
    #[error("[{action}] request to node [{node}] timed out after {millis}ms")]
    Timeout {
        action: String,
        node: NodeId,
        millis: u64,
    },

    /// The remote handler ran and returned an error
    #[error("remote [{kind}]: {message}")]
    Remote { kind: String, message: String },

    /// Payload could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),
}

impl TransportError {
    pub fn remote(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// True when the remote side never produced an answer
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}
