use thiserror::Error;

use crate::parameters::bounds::BoundsError;
use crate::parameters::expression::ExpressionError;

/// Error types for the spectrafit-rs library.
#[derive(Error, Debug)]
pub enum SpectraFitError {
    /// A model tag that the registry does not know.
    #[error("Unknown model: '{0}'")]
    UnknownModel(String),

    /// An attribute name that is not part of the model's signature.
    #[error("Unknown attribute '{attribute}' for model '{model}'")]
    UnknownAttribute { model: String, attribute: String },

    /// Two peaks flatten to the same parameter name.
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// Derived parameters do not form a DAG.
    #[error("Cyclic expression involving: {}", .0.join(", "))]
    CyclicExpression(Vec<String>),

    /// A varying parameter whose value lies outside its bounds.
    #[error("Invalid bounds for parameter '{name}': min={min}, value={value}, max={max}")]
    InvalidBounds {
        name: String,
        min: f64,
        value: f64,
        max: f64,
    },

    /// Non-finite values in the data under the `raise` NaN policy.
    #[error("Non-finite data: {0}")]
    NonFiniteData(String),

    /// An expression that failed to parse or evaluate.
    #[error("Expression error in '{name}': {source}")]
    Expression {
        name: String,
        #[source]
        source: ExpressionError,
    },

    /// An expression referencing a name that is not a parameter.
    #[error("Parameter '{name}' references undefined parameter '{reference}'")]
    UndefinedReference { name: String, reference: String },

    /// An optimization method name that is not registered.
    #[error("Unknown optimization method: '{0}'")]
    UnknownMethod(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input data or configuration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// Error during computational processing.
    #[error("Computation error: {0}")]
    Computation(String),

    /// Bounds transform error.
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for spectrafit-rs operations.
pub type Result<T> = std::result::Result<T, SpectraFitError>;
