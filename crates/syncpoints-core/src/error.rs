//! Crate-level error types

use thiserror::Error;

use crate::engine::EngineError;

/// Errors raised by the graph generators
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    /// A parameter is outside its allowed range
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Lattice tiles must be triangles, squares or hexagons
    #[error("Unsupported polygon: {0} edges (expected 3, 4 or 6)")]
    UnsupportedPolygon(u8),

    /// The generated structure was rejected by the graph
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl GenerationError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Top-level error of the crate
#[derive(Debug, Error)]
pub enum SyncPointsError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A graph or statistics document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncPointsError {
    /// Check if the error came from malformed input rather than a run
    pub fn is_input_error(&self) -> bool {
        match self {
            SyncPointsError::Engine(e) => e.is_structural(),
            SyncPointsError::Generation(_) | SyncPointsError::Serialization(_) => true,
        }
    }
}
