//! Error types for the colloc engine.
//!
//! Configuration problems are detected before any heavy work starts and abort the
//! whole operation. Per-point aggregation failures never surface here; they are
//! folded into the output as invalid values and summarised instead.

use thiserror::Error;

/// The main error type for colloc operations.
#[derive(Error, Debug)]
pub enum CollocError {
    /// Unsupported kernel/structure combination, malformed constraints, missing naming
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Too many target points could not be resolved
    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    /// A dataset of the wrong structure was added to a homogeneous collection
    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// Invalid coordinate errors
    #[error("Invalid coordinates: {message}")]
    InvalidCoordinates { message: String },

    /// A custom kernel reported a fatal error
    #[error("Kernel error: {message}")]
    Kernel { message: String },

    /// The run was cancelled before all target points were processed
    #[error("Collocation cancelled after {processed} of {total} points")]
    Cancelled { processed: usize, total: usize },

    /// ndarray shape errors
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Arrow conversion errors
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollocError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CollocError::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error must abort the run immediately
    pub fn is_configuration(&self) -> bool {
        matches!(self, CollocError::Configuration { .. })
    }
}

/// Convenience type alias for Results with CollocError
pub type Result<T> = std::result::Result<T, CollocError>;
