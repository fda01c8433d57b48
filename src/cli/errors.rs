//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::cluster::ClusterError;
use crate::replication::ReplicationError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Simulation file missing, malformed or inconsistent
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Verification failed on the primary
    VerificationFailed,
    /// Async runtime could not start
    RuntimeFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CLOSEGUARD_CLI_CONFIG_ERROR",
            Self::IoError => "CLOSEGUARD_CLI_IO_ERROR",
            Self::VerificationFailed => "CLOSEGUARD_CLI_VERIFICATION_FAILED",
            Self::RuntimeFailed => "CLOSEGUARD_CLI_RUNTIME_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn verification_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::VerificationFailed, msg)
    }

    pub fn runtime_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RuntimeFailed, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ClusterError> for CliError {
    fn from(e: ClusterError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<ReplicationError> for CliError {
    fn from(e: ReplicationError) -> Self {
        match e {
            ReplicationError::Configuration(message) => Self::config_error(message),
            ReplicationError::Cluster(cluster) => cluster.into(),
            other => Self::verification_failed(other.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::config_error("missing index");
        assert_eq!(err.to_string(), "CLOSEGUARD_CLI_CONFIG_ERROR: missing index");
    }

    #[test]
    fn test_primary_failure_maps_to_verification_failed() {
        let err: CliError = ReplicationError::precondition("not blocked").into();
        assert_eq!(err.code(), &CliErrorCode::VerificationFailed);
        assert_eq!(err.message(), "not blocked");
    }
}
