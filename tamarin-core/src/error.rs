//! Error types for Tamarin generation.

use thiserror::Error;

/// Main error type for Tamarin generation.
///
/// Errors are cheap to clone so that configuration-time failures (for
/// example a malformed path passed to a chained builder method) can be held
/// until sampling, where they surface as the first error of the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TamarinError {
    /// A type could not be decomposed into properties or generated at all.
    #[error("cannot resolve `{type_name}`: {reason}")]
    Resolution { type_name: String, reason: String },

    /// Merged constraint bounds contradict each other.
    #[error("conflicting constraints on `{property}`: {message}")]
    ConstraintConflict { property: String, message: String },

    /// A filter, post-condition or validation loop exhausted its budget.
    #[error("gave up after {attempts} attempts: {context}")]
    RetryBudgetExceeded { attempts: usize, context: String },

    /// A path does not address any node of the current tree shape.
    #[error("path `{path}` cannot be resolved against `{type_name}`: {reason}")]
    PathResolution {
        path: String,
        type_name: String,
        reason: String,
    },

    /// A path expression is not well formed.
    #[error("invalid path `{input}` at offset {position}: {message}")]
    PathSyntax {
        input: String,
        position: usize,
        message: String,
    },

    /// A construction strategy failed while folding children.
    #[error("cannot construct `{type_name}`: {reason}")]
    Introspection { type_name: String, reason: String },

    /// A generated value does not fit the requested Rust type.
    #[error("cannot convert {found} into `{expected}`")]
    Conversion { expected: String, found: String },

    /// A manipulation is not applicable to the node it resolved to.
    #[error("invalid manipulation on `{path}`: {reason}")]
    InvalidManipulation { path: String, reason: String },
}

impl TamarinError {
    pub(crate) fn conversion(expected: impl Into<String>, found: impl Into<String>) -> Self {
        TamarinError::Conversion {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn introspection(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        TamarinError::Introspection {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Number of attempts recorded by a retry failure.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            TamarinError::RetryBudgetExceeded { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Result type for Tamarin operations.
pub type Result<T> = std::result::Result<T, TamarinError>;
