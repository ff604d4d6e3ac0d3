//! syncpoints-core: chip-firing token propagation on directed weighted graphs
//!
//! - Graph: vertices with a firing threshold, weighted directed edges
//! - Simulation: discrete-event scheduler on a virtual clock
//! - FiringPolicy: immediate reset, BTW sandpile or Oslo redistribution
//! - StatisticsModule: per-vertex token counts and threshold histories
//! - Live driver: paces a run against wall time with pause/resume/stop
//!
//! # Example
//!
//! ```rust,ignore
//! use syncpoints_core::{EngineConfig, Graph, PolicyKind, Simulation, Vertex, Color};
//!
//! let mut graph = Graph::new();
//! graph.add_vertex(Vertex::new(0, 1)?)?;
//! graph.add_vertex(Vertex::new(1, 1)?)?;
//! let edge = graph.add_edge(0, 1, 2.0)?;
//!
//! let mut sim = Simulation::new(graph, EngineConfig::default())?;
//! sim.set_starting_tokens(edge, Color::Blue, 1)?;
//! sim.start(PolicyKind::ImmediateReset, false)?;
//! let reason = sim.run_until_stopped()?;
//! ```

pub mod engine;
pub mod error;
pub mod generate;
pub mod live;
pub mod records;
pub mod sampler;

// Re-exports for convenience
pub use engine::{
    build_policy, CapacityLimits, Color, Edge, EdgeId, EngineConfig, EngineError, EventRecorder,
    FiringPolicy, Graph, InFlightToken, PolicyKind, Simulation, SimulationEvent,
    SimulationObserver, SimulationState, StatisticsModule, StatisticsSnapshot, StatsHandle,
    StopReason, Vertex, VertexData, VertexId,
};
pub use error::{GenerationError, SyncPointsError};
pub use generate::{GeneratedGraph, LatticeParams, RandomGraphParams, Tiling};
pub use live::{spawn_live, LiveOptions, RunControls, RunHandle, RunOutcome};
pub use records::{
    export_starting_edges, import_starting_edges, EdgeRecord, GraphDocument, StartingEdgeRecord,
    VertexRecord,
};
pub use sampler::{spawn_sampler, SamplerHandle, StatsSample};
