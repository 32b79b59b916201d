//! Error types for the condition engine.

use thiserror::Error;
use vigil_model::ModelError;

/// Result type alias for condition operations.
pub type ConditionResult<T> = Result<T, ConditionError>;

/// Errors that can occur while declaring or reconciling conditions.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The condition type has no governing rule to evaluate.
    #[error("condition type {code} has no governing rule")]
    UnsupportedOperation { code: String },

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A condition type with the same code is already registered.
    #[error("duplicate condition type code: {code}")]
    DuplicateCode { code: String },

    /// The code of a condition type was already assigned.
    #[error("condition type code already sealed as {code}, cannot assign {attempted}")]
    CodeAlreadySealed { code: String, attempted: String },

    /// The condition type was used before a code was assigned.
    #[error("condition type '{message}' has no code")]
    UnsealedCode { message: String },

    /// Dependencies of a governing predicate could not be determined.
    #[error("cannot determine dependencies of predicate on {root_type}; list them explicitly")]
    MissingDependencies { root_type: String },

    /// The object graph rejected an operation.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A predicate or expression failed to evaluate.
    #[error("predicate failed: {message}")]
    Predicate { message: String },

    /// A condition raised as an error.
    #[error("{code}: {message}")]
    Raised { code: String, message: String },

    /// A rule-set document could not be decoded.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ConditionError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn predicate(message: impl Into<String>) -> Self {
        Self::Predicate {
            message: message.into(),
        }
    }
}

impl From<std::convert::Infallible> for ConditionError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}
