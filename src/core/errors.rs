//! Error types for the dexprint-rs library.
//!
//! Every failure in the engine is scoped to a single call. Nothing here is
//! fatal to the process, and none of these errors leave the corpus or the
//! evaluation context in a modified state.
//!
//! Script problems (compile errors, runtime errors, non-fingerprint values)
//! and resolution outcomes (not found, ambiguous, primitive failure) are
//! *outcomes*, not errors: they are modelled by
//! [`EvaluationOutcome`](crate::script::EvaluationOutcome) and
//! [`ResolveOutcome`](crate::resolver::ResolveOutcome). This type covers
//! everything else.

use std::io;

use thiserror::Error;

/// Main result type for dexprint operations.
pub type Result<T> = std::result::Result<T, DexprintError>;

/// Error type for all dexprint operations.
#[derive(Error, Debug)]
pub enum DexprintError {
    /// I/O related errors (corpus files, scratch directories, config files)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Corpus construction errors
    #[error("Corpus error: {message}")]
    Corpus {
        /// Error description
        message: String,
        /// Method descriptor involved, if any
        method: Option<String>,
    },

    /// The solver was asked about a method whose features were never extracted
    #[error("Features for method '{method}' were never extracted")]
    SolverUncomputed {
        /// Method descriptor that was looked up
        method: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
        /// Expected value or format
        expected: Option<String>,
        /// Actual value received
        actual: Option<String>,
    },

    /// Background task and channel errors
    #[error("Concurrency error: {message}")]
    Concurrency {
        /// Error description
        message: String,
    },

    /// An operation exceeded its configured time limit
    #[error("Operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Configured limit in milliseconds
        elapsed_ms: u64,
    },
}

impl DexprintError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new corpus error naming the offending method
    pub fn corpus_method(message: impl Into<String>, method: impl Into<String>) -> Self {
        Self::Corpus {
            message: message.into(),
            method: Some(method.into()),
        }
    }

    /// Create an error for a method with no materialized feature vector
    pub fn solver_uncomputed(method: impl Into<String>) -> Self {
        Self::SolverUncomputed {
            method: method.into(),
        }
    }

    /// Create a new validation error with expected/actual detail
    pub fn validation_mismatch(
        message: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }

    /// Create a new concurrency error
    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout(operation: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_ms,
        }
    }
}

impl From<io::Error> for DexprintError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for DexprintError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for DexprintError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<tokio::task::JoinError> for DexprintError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Self::concurrency(format!("Background task panicked: {err}"))
        } else {
            Self::concurrency(format!("Background task was cancelled: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DexprintError::config_field("Invalid configuration", "solver.max_features");
        assert!(matches!(err, DexprintError::Config { field: Some(_), .. }));

        let err = DexprintError::corpus_method("Duplicate method", "La;->b()V");
        assert_eq!(err.to_string(), "Corpus error: Duplicate method");
    }

    #[test]
    fn test_concurrency_display() {
        let err = DexprintError::concurrency("Engine worker pool is closed");
        assert_eq!(err.to_string(), "Concurrency error: Engine worker pool is closed");
    }

    #[test]
    fn test_solver_uncomputed_display() {
        let err = DexprintError::solver_uncomputed("La;->b()V");
        assert_eq!(
            err.to_string(),
            "Features for method 'La;->b()V' were never extracted"
        );
    }

    #[test]
    fn test_validation_mismatch() {
        let err = DexprintError::validation_mismatch("bad window", "window", ">= 1", "0");

        if let DexprintError::Validation {
            field,
            expected,
            actual,
            ..
        } = err
        {
            assert_eq!(field.as_deref(), Some("window"));
            assert_eq!(expected.as_deref(), Some(">= 1"));
            assert_eq!(actual.as_deref(), Some("0"));
        } else {
            panic!("Expected Validation error");
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: DexprintError = io_err.into();

        assert!(matches!(err, DexprintError::Io { .. }));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("invalid json").unwrap_err();
        let err: DexprintError = json_err.into();

        if let DexprintError::Serialization { data_type, .. } = err {
            assert_eq!(data_type, Some("JSON".to_string()));
        } else {
            panic!("Expected Serialization error");
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<i32>("invalid: yaml: content").unwrap_err();
        let err: DexprintError = yaml_err.into();

        assert!(matches!(err, DexprintError::Serialization { .. }));
    }
}
