//! Engine error taxonomy
//!
//! Error codes:
//! - GRID_TYPE_RESOLUTION (ERROR)
//! - GRID_SERIALIZATION (ERROR)
//! - GRID_CONTEXT_TIMEOUT (ERROR)
//! - GRID_MERGE_FAILED (FATAL)
//! - GRID_EXECUTION_FAILED (ERROR)
//! - GRID_GRANULARITY_VIOLATION (ERROR)
//! - GRID_INVALID_PLAN (ERROR)
//! - GRID_CANCELLED (ERROR)
//! - GRID_JOB_TIMEOUT (ERROR)
//! - GRID_REMOTE_FAILURE (ERROR)
//! - GRID_CONFIG_ERROR (ERROR)
//!
//! Serialization and timeout failures are scoped to a single partial-result
//! exchange. Only merge failures are fatal: they mean two producers disagreed
//! on the shape of a correctly typed plan.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::projection::{ProjectionType, RowGranularity};

/// Severity levels for engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The owning job fails, the node keeps serving
    Error,
    /// Internal consistency fault
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    TypeResolution,
    Serialization,
    ContextTimeout,
    MergeFailed,
    ExecutionFailed,
    GranularityViolation,
    InvalidPlan,
    Cancelled,
    JobTimeout,
    RemoteFailure,
    ConfigError,
}

impl ErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::TypeResolution => "GRID_TYPE_RESOLUTION",
            ErrorCode::Serialization => "GRID_SERIALIZATION",
            ErrorCode::ContextTimeout => "GRID_CONTEXT_TIMEOUT",
            ErrorCode::MergeFailed => "GRID_MERGE_FAILED",
            ErrorCode::ExecutionFailed => "GRID_EXECUTION_FAILED",
            ErrorCode::GranularityViolation => "GRID_GRANULARITY_VIOLATION",
            ErrorCode::InvalidPlan => "GRID_INVALID_PLAN",
            ErrorCode::Cancelled => "GRID_CANCELLED",
            ErrorCode::JobTimeout => "GRID_JOB_TIMEOUT",
            ErrorCode::RemoteFailure => "GRID_REMOTE_FAILURE",
            ErrorCode::ConfigError => "GRID_CONFIG_ERROR",
        }
    }

    /// Returns the severity level for this code
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::MergeFailed => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the execution core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A function was resolved against argument types it does not support
    #[error("type resolution failed: {0}")]
    TypeResolution(String),

    /// Malformed wire bytes or a value that does not fit its column streamer
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A partial result arrived for a job that never registered
    #[error("no execution context registered for job {job_id} within {waited_ms}ms")]
    ContextTimeout { job_id: Uuid, waited_ms: u64 },

    /// Partial states of different shapes were merged
    #[error("merge failed: {0}")]
    Merge(String),

    /// Row-level evaluation failure
    #[error("execution failed: {0}")]
    Execution(String),

    /// A projector was invoked below the granularity it requires
    #[error("{projection} projection requires {required} granularity but was invoked at {actual}")]
    GranularityViolation {
        projection: ProjectionType,
        required: RowGranularity,
        actual: RowGranularity,
    },

    /// Structurally invalid plan
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The owning execution was cancelled
    #[error("execution cancelled")]
    Cancelled,

    /// Not every producer finished before the job deadline
    #[error("job {job_id} timed out with {finished} of {expected} producers finished")]
    JobTimeout {
        job_id: Uuid,
        finished: usize,
        expected: usize,
    },

    /// A producer node reported a failure over the wire
    #[error("remote execution failed: {0}")]
    Remote(String),

    /// Invalid engine configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn type_resolution(reason: impl Into<String>) -> Self {
        EngineError::TypeResolution(reason.into())
    }

    pub fn serialization(reason: impl Into<String>) -> Self {
        EngineError::Serialization(reason.into())
    }

    pub fn merge(reason: impl Into<String>) -> Self {
        EngineError::Merge(reason.into())
    }

    pub fn execution(reason: impl Into<String>) -> Self {
        EngineError::Execution(reason.into())
    }

    pub fn invalid_plan(reason: impl Into<String>) -> Self {
        EngineError::InvalidPlan(reason.into())
    }

    pub fn config(reason: impl Into<String>) -> Self {
        EngineError::Config(reason.into())
    }

    /// Returns the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::TypeResolution(_) => ErrorCode::TypeResolution,
            EngineError::Serialization(_) => ErrorCode::Serialization,
            EngineError::ContextTimeout { .. } => ErrorCode::ContextTimeout,
            EngineError::Merge(_) => ErrorCode::MergeFailed,
            EngineError::Execution(_) => ErrorCode::ExecutionFailed,
            EngineError::GranularityViolation { .. } => ErrorCode::GranularityViolation,
            EngineError::InvalidPlan(_) => ErrorCode::InvalidPlan,
            EngineError::Cancelled => ErrorCode::Cancelled,
            EngineError::JobTimeout { .. } => ErrorCode::JobTimeout,
            EngineError::Remote(_) => ErrorCode::RemoteFailure,
            EngineError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
