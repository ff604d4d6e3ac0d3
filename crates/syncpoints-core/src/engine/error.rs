//! Error types for the propagation engine
//!
//! Only structural and lifecycle failures are errors. Anomalies that occur
//! while a cascade is running (negative sync counters, capacity overflow)
//! are absorbed into statistics and reported through the event surface.

use thiserror::Error;

use super::graph::{EdgeId, VertexId};

/// Errors that can occur while building a graph or driving a simulation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A vertex was constructed with a firing threshold below 1
    #[error("Invalid threshold for vertex {vertex_id}: init_sync must be >= 1, got {init_sync}")]
    InvalidThreshold { vertex_id: VertexId, init_sync: i64 },

    /// A parallel edge was added to a graph that forbids multigraphs
    #[error("Duplicate edge: {source_id} -> {target_id} already exists")]
    DuplicateEdge {
        source_id: VertexId,
        target_id: VertexId,
    },

    /// A vertex id was registered twice
    #[error("Duplicate vertex: {0}")]
    DuplicateVertex(VertexId),

    /// Referenced vertex is not part of the graph
    #[error("Unknown vertex: {0}")]
    UnknownVertex(VertexId),

    /// Referenced edge is not part of the graph
    #[error("Unknown edge: {0}")]
    UnknownEdge(EdgeId),

    /// Edge weight must be a positive finite number
    #[error("Invalid weight for edge {source_id} -> {target_id}: {weight}")]
    InvalidWeight {
        source_id: VertexId,
        target_id: VertexId,
        weight: f64,
    },

    /// Operation is not valid in the scheduler's current state
    #[error("Invalid state for {operation}: simulation is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    /// Headless loop guard tripped before the run drained
    #[error("Event limit exceeded: {0}")]
    EventLimitExceeded(usize),

    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// The live driver task panicked or was cancelled
    #[error("Live driver failed: {0}")]
    Driver(String),
}

impl EngineError {
    /// Create an invalid threshold error
    pub fn invalid_threshold(vertex_id: VertexId, init_sync: i64) -> Self {
        Self::InvalidThreshold {
            vertex_id,
            init_sync,
        }
    }

    /// Create a duplicate edge error
    pub fn duplicate_edge(source_id: VertexId, target_id: VertexId) -> Self {
        Self::DuplicateEdge {
            source_id,
            target_id,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(operation: &'static str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if the error was raised while constructing a graph
    ///
    /// Structural errors leave the graph unchanged.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidThreshold { .. }
                | EngineError::DuplicateEdge { .. }
                | EngineError::DuplicateVertex(_)
                | EngineError::UnknownVertex(_)
                | EngineError::UnknownEdge(_)
                | EngineError::InvalidWeight { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::EngineError: Send, Sync);
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::EventLimitExceeded(100);
        assert_eq!(format!("{}", err), "Event limit exceeded: 100");
    }

    #[test]
    fn test_invalid_threshold() {
        let err = EngineError::invalid_threshold(VertexId(4), 0);
        match &err {
            EngineError::InvalidThreshold {
                vertex_id,
                init_sync,
            } => {
                assert_eq!(*vertex_id, VertexId(4));
                assert_eq!(*init_sync, 0);
            }
            _ => panic!("Wrong error type"),
        }
        assert!(err.to_string().contains("init_sync must be >= 1"));
    }

    #[test]
    fn test_duplicate_edge_display() {
        let err = EngineError::duplicate_edge(VertexId(1), VertexId(2));
        assert_eq!(err.to_string(), "Duplicate edge: 1 -> 2 already exists");
    }

    #[test]
    fn test_is_structural() {
        assert!(EngineError::invalid_threshold(VertexId(0), -1).is_structural());
        assert!(EngineError::duplicate_edge(VertexId(0), VertexId(1)).is_structural());
        assert!(EngineError::UnknownEdge(EdgeId(3)).is_structural());

        assert!(!EngineError::EventLimitExceeded(10).is_structural());
        assert!(!EngineError::invalid_state("resume", "Running").is_structural());
        assert!(!EngineError::config_error("bad").is_structural());
        assert!(!EngineError::Driver("cancelled".into()).is_structural());
    }
}
