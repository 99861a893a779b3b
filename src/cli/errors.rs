//! CLI-specific error types

use std::fmt;
use std::io;

use crate::errors::EngineError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Plan file unreadable or rejected
    PlanError,
    /// Input rows do not match the plan
    InputError,
    /// The job failed
    ExecutionFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "GRID_CLI_CONFIG_ERROR",
            Self::IoError => "GRID_CLI_IO_ERROR",
            Self::PlanError => "GRID_CLI_PLAN_ERROR",
            Self::InputError => "GRID_CLI_INPUT_ERROR",
            Self::ExecutionFailed => "GRID_CLI_EXECUTION_FAILED",
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
    /// Create a new CLI error
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

    pub fn plan_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::PlanError, msg)
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ExecutionFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
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

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        let message = format!("{}: {}", e.code(), e);
        match e {
            EngineError::Config(_) => Self::config_error(message),
            EngineError::InvalidPlan(_)
            | EngineError::TypeResolution(_)
            | EngineError::GranularityViolation { .. } => Self::plan_error(message),
            _ => Self::execution_failed(message),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_mapping() {
        let err = CliError::from(EngineError::config("rows_per_request must be positive"));
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert!(err.message().contains("GRID_CONFIG_ERROR"));

        let err = CliError::from(EngineError::Cancelled);
        assert_eq!(err.code_str(), "GRID_CLI_EXECUTION_FAILED");
    }

    #[test]
    fn test_display_has_code() {
        let err = CliError::input_error("row 3 has 2 columns");
        assert_eq!(err.to_string(), "GRID_CLI_INPUT_ERROR: row 3 has 2 columns");
    }
}
