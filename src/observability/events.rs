//! Observable engine events

use std::fmt;

use super::logger::Severity;

/// Observable events of distributed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Context manager
    /// A merge context registered for a job
    JobRegistered,
    /// A partial result arrived before its job registered
    ResultDeferred,
    /// A partial result was handed to its merge context
    ResultDelivered,
    /// A late result for a finished or cancelled job was dropped
    ResultDiscarded,
    /// A deferred result waited too long for its job
    ContextTimeout,
    /// A payload failed to decode
    MalformedPayload,

    // Job lifecycle
    JobCompleted,
    JobFailed,
    JobCancelled,

    // Node execution
    CollectStart,
    CollectComplete,
    CollectFailed,

    // CLI
    ExplainComplete,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::JobRegistered => "JOB_REGISTERED",
            Event::ResultDeferred => "RESULT_DEFERRED",
            Event::ResultDelivered => "RESULT_DELIVERED",
            Event::ResultDiscarded => "RESULT_DISCARDED",
            Event::ContextTimeout => "CONTEXT_TIMEOUT",
            Event::MalformedPayload => "MALFORMED_PAYLOAD",
            Event::JobCompleted => "JOB_COMPLETE",
            Event::JobFailed => "JOB_FAILED",
            Event::JobCancelled => "JOB_CANCELLED",
            Event::CollectStart => "COLLECT_BEGIN",
            Event::CollectComplete => "COLLECT_COMPLETE",
            Event::CollectFailed => "COLLECT_FAILED",
            Event::ExplainComplete => "EXPLAIN_COMPLETE",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ResultDelivered | Event::ResultDeferred => Severity::Trace,
            Event::ResultDiscarded => Severity::Warn,
            Event::ContextTimeout
            | Event::MalformedPayload
            | Event::JobFailed
            | Event::CollectFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
