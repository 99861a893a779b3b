//! Observability subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Counter metrics
//! - Typed lifecycle events
//!
//! # Usage
//!
//! ```ignore
//! use gridsql::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::JobRegistered, &[("job_id", "...")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_requests_received();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // verifies no panic
        log_event(Event::ConfigLoaded);
        log_event_with_fields(Event::JobFailed, &[("reason", "test")]);
    }
}
