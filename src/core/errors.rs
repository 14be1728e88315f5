use std::fmt;
use thiserror::Error;

use crate::flow::item::Key;

/// Unified error type for the control-flow library
#[derive(Debug, Error)]
pub enum FlowError {
    /// A task failed and the run was not settling
    #[error(transparent)]
    Task(#[from] TaskFailure),

    /// The submitted collection is not usable
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// IO errors
    #[error("IO operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Runner bookkeeping went wrong
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FlowError {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error pointing at a field
    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Create an IO error
    pub fn io<S: Into<String>>(operation: S, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The task failure carried by this error, if any
    pub fn task_failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::Task(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn into_task_failure(self) -> Option<TaskFailure> {
        match self {
            Self::Task(failure) => Some(failure),
            _ => None,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Task(_) => ErrorCategory::Task,
            Self::InvalidInput { .. } => ErrorCategory::InvalidInput,
            Self::Configuration { .. } | Self::Serialization { .. } | Self::Io { .. } => {
                ErrorCategory::Configuration
            }
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Error categories for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Task,
    InvalidInput,
    Configuration,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// The error a single task produced, tagged with the key of its item.
///
/// Whatever the task returned (or the message of a panic) is kept as an
/// [`anyhow::Error`]; no subtypes are distinguished.
#[derive(Debug, Error)]
#[error("Task {key} failed: {error:#}")]
pub struct TaskFailure {
    key: Key,
    error: anyhow::Error,
}

impl TaskFailure {
    pub fn new(key: Key, error: anyhow::Error) -> Self {
        Self { key, error }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The error produced by the task itself
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn into_error(self) -> anyhow::Error {
        self.error
    }

    /// Top-level message of the task error, without the key prefix
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// Result type alias for control-flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_failure_display() {
        let failure = TaskFailure::new(Key::Index(2), anyhow::anyhow!("foo"));
        assert_eq!(failure.message(), "foo");
        assert_eq!(failure.to_string(), "Task #2 failed: foo");

        let error = FlowError::from(failure);
        assert_eq!(error.category(), ErrorCategory::Task);
        assert_eq!(error.to_string(), "Task #2 failed: foo");
        assert_eq!(error.task_failure().map(|f| f.key()), Some(&Key::Index(2)));
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            FlowError::invalid_input("not a sequence").category(),
            ErrorCategory::InvalidInput
        );
        assert_eq!(
            FlowError::configuration_field("must be positive", "concurrency").category(),
            ErrorCategory::Configuration
        );
        assert!(FlowError::internal("slot").into_task_failure().is_none());

        let failed = FlowError::from(TaskFailure::new(Key::Index(0), anyhow::anyhow!("boom")));
        assert_eq!(failed.category().to_string(), "task");
        assert_eq!(ErrorCategory::InvalidInput.to_string(), "invalid_input");
    }
}
