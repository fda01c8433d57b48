//! Observability
//!
//! Structured JSON logging of typed events, and monotonic counters.
//! Observability is read-only: nothing here can fail or alter the
//! protocol it observes.
//!
//! ```ignore
//! use closeguard::observability::{log_event, Event};
//!
//! log_event(Event::ShardCopyMarkedStale, &[("shard", "[index][0]"), ("allocation_id", "a1")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_does_not_panic() {
        log_event(Event::VerifyShardBegin, &[]);
        log_event(Event::ShardStateReportFailed, &[("reason", "no master")]);
    }
}
