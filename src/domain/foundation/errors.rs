//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i32,
        max: i32,
        actual: i32,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i32, max: i32, actual: i32) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes for the reasoning-chain pipeline, one per §7 error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    PlanningFailed,
    OrchestrationFailed,
    ToolNotFound,
    ParameterValidation,
    ToolExecutionError,
    DependencyUnsatisfied,
    Cancelled,
    Reentry,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::PlanningFailed => "PLANNING_FAILED",
            ErrorCode::OrchestrationFailed => "ORCHESTRATION_FAILED",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::ParameterValidation => "PARAMETER_VALIDATION",
            ErrorCode::ToolExecutionError => "TOOL_EXECUTION_ERROR",
            ErrorCode::DependencyUnsatisfied => "DEPENDENCY_UNSATISFIED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Reentry => "REENTRY",
            ErrorCode::Internal => "INTERNAL",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Shorthand for a `PlanningFailed` error with the given cause.
    pub fn planning_failed(cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self::new(ErrorCode::PlanningFailed, format!("Planning failed: {cause}"))
    }

    /// Shorthand for an `OrchestrationFailed` error with the given cause.
    pub fn orchestration_failed(cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self::new(
            ErrorCode::OrchestrationFailed,
            format!("Orchestration failed: {cause}"),
        )
    }

    /// Shorthand for a `ToolNotFound` error.
    pub fn tool_not_found(tool_name: impl Into<String>) -> Self {
        let tool_name = tool_name.into();
        Self::new(ErrorCode::ToolNotFound, format!("Tool not found: {tool_name}"))
            .with_detail("tool_name", tool_name)
    }

    /// Shorthand for a `Reentry` error.
    pub fn reentry() -> Self {
        Self::new(ErrorCode::Reentry, "already processing")
    }

    /// Shorthand for a `Cancelled` error.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Workflow cancelled by user")
    }

    /// True if this error kind is produced by the Tool Bridge and should be
    /// handled locally by a step's recovery policy rather than aborting the
    /// whole chain.
    pub fn is_step_recoverable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ToolNotFound
                | ErrorCode::ParameterValidation
                | ErrorCode::ToolExecutionError
                | ErrorCode::DependencyUnsatisfied
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("username");
        assert_eq!(format!("{}", err), "Field 'username' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("age", 0, 100, 150);
        assert_eq!(
            format!("{}", err),
            "Field 'age' must be between 0 and 100, got 150"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::ToolNotFound, "Tool not found: read_file");
        assert_eq!(format!("{}", err), "[TOOL_NOT_FOUND] Tool not found: read_file");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::ParameterValidation, "bad params")
            .with_detail("field", "path");
        assert_eq!(err.details.get("field"), Some(&"path".to_string()));
    }

    #[test]
    fn planning_failed_embeds_cause() {
        let err = DomainError::planning_failed("reasoner timed out");
        assert_eq!(err.code, ErrorCode::PlanningFailed);
        assert_eq!(err.message, "Planning failed: reasoner timed out");
    }

    #[test]
    fn tool_not_found_records_tool_name_detail() {
        let err = DomainError::tool_not_found("write_file");
        assert_eq!(err.details.get("tool_name"), Some(&"write_file".to_string()));
    }

    #[test]
    fn step_recoverable_classification_matches_taxonomy() {
        assert!(DomainError::tool_not_found("x").is_step_recoverable());
        assert!(!DomainError::planning_failed("x").is_step_recoverable());
        assert!(!DomainError::cancelled().is_step_recoverable());
        assert!(!DomainError::reentry().is_step_recoverable());
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(format!("{}", ErrorCode::Cancelled), "CANCELLED");
        assert_eq!(format!("{}", ErrorCode::Internal), "INTERNAL");
    }
}
