use thiserror::Error;

use crate::entities::expression::ExpressionError;

/// Error types for the fitgraph library.
///
/// Container operations report naming and evaluation problems through
/// sentinels and recorded state instead; these errors surface from the
/// numeric routines and from persistence.
#[derive(Error, Debug)]
pub enum FitGraphError {
    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error indicating a singular (or not positive definite) matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Error during model evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Error while parsing or evaluating an expression.
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No entity with the given name or id.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// No container with the given id.
    #[error("Container not found: {0}")]
    ContainerNotFound(usize),

    /// No dataset with the given id.
    #[error("Dataset not found: {0}")]
    DatasetNotFound(usize),

    /// A persisted entity was rejected while loading.
    #[error("Rejected record '{0}'")]
    RejectedRecord(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for fitgraph operations.
pub type Result<T> = std::result::Result<T, FitGraphError>;
