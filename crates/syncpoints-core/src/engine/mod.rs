//! Token Propagation Engine
//!
//! A chip-firing (sandpile) simulation over a directed weighted graph.
//! Key concepts:
//!
//! - **Token**: a unit travelling along one edge for `weight * unit_scale`
//! - **Sync counter**: per-vertex, per-colour capacity left before firing
//! - **Fire**: a vertex whose counter dropped below 1 redistributes tokens
//!   over its out-edges according to the run's [`FiringPolicy`]
//! - **Dead end**: a vertex whose counter is not back at `init_sync` when
//!   the run drains
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Simulation                           │
//! │  ┌───────────┐   arrival    ┌────────────────┐               │
//! │  │ Arrivals  │ ───────────→ │ ThresholdState │               │
//! │  │ (min-heap)│              └───────┬────────┘               │
//! │  └─────▲─────┘                      │ below threshold        │
//! │        │ emit                       ▼                        │
//! │        │                    ┌────────────────┐               │
//! │        └─────────────────── │ FiringPolicy   │ → FirePlan    │
//! │                             └────────────────┘               │
//! │  StatisticsModule ← every arrival / counter change / emit    │
//! │  SimulationObserver ← arrived / fired / negative / stopped   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Policies
//!
//! - `PolicyKind::ImmediateReset` (default): full broadcast, then reset.
//! - `PolicyKind::BoundedIncremental`: BTW sandpile, counters carry over.
//! - `PolicyKind::RandomizedThreshold`: Oslo model, threshold redrawn on
//!   every fire.

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod policy;
pub mod scheduler;
pub mod statistics;
pub mod threshold;

// Re-exports
pub use config::{CapacityLimits, EngineConfig};
pub use error::EngineError;
pub use events::{EventRecorder, SimulationEvent, SimulationObserver, StopReason};
pub use graph::{Edge, EdgeId, Graph, Vertex, VertexId};
pub use policy::{
    build_policy, BoundedIncremental, FirePlan, FireStep, FiringPolicy, ImmediateReset,
    PolicyKind, RandomizedThreshold,
};
pub use scheduler::{InFlightToken, Simulation, SimulationState};
pub use statistics::{StatisticsModule, StatisticsSnapshot, StatsHandle, VertexData};
pub use threshold::{Color, ThresholdState};
