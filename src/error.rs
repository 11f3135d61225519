//! Error types for waterline.
//!
//! All errors are strongly typed using thiserror so hosts can match on
//! the exact failure instead of parsing messages.

use thiserror::Error;

use crate::registry::SessionId;

/// Validation errors raised for caller input that can never succeed on retry.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Config field '{field}' value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Fact id cannot be empty")]
    EmptyFactId,
}

/// Errors raised when the engine is driven in a state that does not allow the call.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Engine is not initialized; call initialize() first")]
    NotInitialized,

    #[error("Nothing to undo: no answers recorded")]
    NothingToUndo,

    #[error("Session not found: {id}")]
    SessionNotFound {
        id: SessionId,
    },

    #[error("Session limit exceeded (max: {max})")]
    SessionLimitExceeded {
        max: usize,
    },
}

/// Failures surfaced by the knowledge loader collaborator.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Knowledge source unavailable: {message}")]
    Source {
        message: String,
    },

    #[error("Malformed {what}: {reason}")]
    Malformed {
        what: String,
        reason: String,
    },
}

impl LoadError {
    /// Creates an error for a knowledge source that could not be reached or read.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Creates a malformed-document error.
    #[must_use]
    pub fn malformed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed("json document", err.to_string())
    }
}

/// Top-level error type for waterline.
#[derive(Debug, Error)]
pub enum WaterlineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl WaterlineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is a load error.
    #[must_use]
    pub const fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    ///
    /// The engine never retries on its own; this only tells the host whether
    /// calling `initialize` again could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Load(e) => matches!(e, LoadError::Source { .. }),
            Self::Validation(_) | Self::Execution(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for waterline operations.
pub type WaterlineResult<T> = Result<T, WaterlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_out_of_range() {
        let err = ValidationError::OutOfRange {
            field: "tau",
            value: 1.5,
            min: 0.0,
            max: 1.0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("tau"));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_execution_error_not_initialized() {
        let err = ExecutionError::NotInitialized;
        assert!(format!("{err}").contains("not initialized"));
    }

    #[test]
    fn test_load_error_from_json() {
        let json_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err: LoadError = json_err.into();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn test_waterline_error_from_validation() {
        let err: WaterlineError = ValidationError::EmptyFactId.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_waterline_error_from_execution() {
        let err: WaterlineError = ExecutionError::NothingToUndo.into();
        assert!(err.is_execution());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_waterline_error_retryable() {
        let transient: WaterlineError = LoadError::unavailable("connection reset").into();
        assert!(transient.is_load());
        assert!(transient.is_retryable());

        let malformed: WaterlineError = LoadError::malformed("cluster rules", "not a list").into();
        assert!(!malformed.is_retryable());
    }

    #[test]
    fn test_waterline_error_internal() {
        let err = WaterlineError::internal("registry lock poisoned");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("registry lock poisoned"));
    }
}
