//! Directed weighted graph model
//!
//! Plain data records for vertices and edges plus bidirectional adjacency
//! (out-edges and in-edges per vertex). Edge iteration order is insertion
//! order, which the firing policies rely on for determinism.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::EngineError;

/// Unique identifier for a vertex within a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub u32);

impl From<u32> for VertexId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an edge, assigned densely in insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A vertex and its firing threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    /// Firing threshold and reset target, always >= 1
    pub init_sync: i64,
    /// Absorbing vertices swallow tokens, never fire and are not tracked
    /// by statistics (used for the lattice border cascade)
    pub absorbing: bool,
}

impl Vertex {
    /// Create a vertex, rejecting thresholds below 1
    pub fn new(id: impl Into<VertexId>, init_sync: i64) -> Result<Self, EngineError> {
        let id = id.into();
        if init_sync < 1 {
            return Err(EngineError::invalid_threshold(id, init_sync));
        }
        Ok(Self {
            id,
            init_sync,
            absorbing: false,
        })
    }

    /// Create an absorbing sink vertex
    pub fn sink(id: impl Into<VertexId>) -> Self {
        Self {
            id: id.into(),
            init_sync: 1,
            absorbing: true,
        }
    }
}

/// Directed edge; the weight doubles as travel duration and distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: VertexId,
    pub target: VertexId,
    pub weight: f64,
}

/// Directed weighted (multi)graph with bidirectional adjacency
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: Vec<Vertex>,
    index: HashMap<VertexId, usize>,
    edges: Vec<Edge>,
    out_edges: Vec<Vec<EdgeId>>,
    in_edges: Vec<Vec<EdgeId>>,
    forbid_parallel_edges: bool,
}

impl Graph {
    /// Create an empty graph that allows parallel edges
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph that rejects parallel edges, as the manual
    /// builder does
    pub fn strict() -> Self {
        Self {
            forbid_parallel_edges: true,
            ..Self::default()
        }
    }

    /// Whether adding a second edge between the same ordered pair fails
    pub fn forbids_parallel_edges(&self) -> bool {
        self.forbid_parallel_edges
    }

    /// Add a vertex
    ///
    /// Non-absorbing vertices need a threshold of at least 1, however they
    /// were built.
    pub fn add_vertex(&mut self, vertex: Vertex) -> Result<VertexId, EngineError> {
        if !vertex.absorbing && vertex.init_sync < 1 {
            return Err(EngineError::invalid_threshold(vertex.id, vertex.init_sync));
        }
        if self.index.contains_key(&vertex.id) {
            return Err(EngineError::DuplicateVertex(vertex.id));
        }
        let id = vertex.id;
        self.index.insert(id, self.vertices.len());
        self.vertices.push(vertex);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        Ok(id)
    }

    /// Add a directed edge
    ///
    /// Fails without modifying the graph when an endpoint is unknown, the
    /// weight is not positive, or a parallel edge exists in a strict graph.
    pub fn add_edge(
        &mut self,
        source: impl Into<VertexId>,
        target: impl Into<VertexId>,
        weight: f64,
    ) -> Result<EdgeId, EngineError> {
        let source = source.into();
        let target = target.into();
        let source_idx = self
            .vertex_index(source)
            .ok_or(EngineError::UnknownVertex(source))?;
        let target_idx = self
            .vertex_index(target)
            .ok_or(EngineError::UnknownVertex(target))?;

        if !(weight.is_finite() && weight > 0.0) {
            return Err(EngineError::InvalidWeight {
                source_id: source,
                target_id: target,
                weight,
            });
        }

        if self.forbid_parallel_edges && self.find_edge(source, target).is_some() {
            return Err(EngineError::duplicate_edge(source, target));
        }

        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            id,
            source,
            target,
            weight,
        });
        self.out_edges[source_idx].push(id);
        self.in_edges[target_idx].push(id);
        Ok(id)
    }

    /// Get a vertex by id
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertex_index(id).map(|idx| &self.vertices[idx])
    }

    /// Get an edge by id
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    /// All vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Outgoing edges of a vertex in insertion order (empty if unknown)
    pub fn out_edges(&self, id: VertexId) -> &[EdgeId] {
        self.vertex_index(id)
            .map(|idx| self.out_edges[idx].as_slice())
            .unwrap_or(&[])
    }

    /// Incoming edges of a vertex in insertion order (empty if unknown)
    pub fn in_edges(&self, id: VertexId) -> &[EdgeId] {
        self.vertex_index(id)
            .map(|idx| self.in_edges[idx].as_slice())
            .unwrap_or(&[])
    }

    /// Check whether the vertex has at least one outgoing edge
    pub fn has_out_edges(&self, id: VertexId) -> bool {
        !self.out_edges(id).is_empty()
    }

    /// First edge from `source` to `target`, if any
    pub fn find_edge(&self, source: VertexId, target: VertexId) -> Option<EdgeId> {
        self.out_edges(source)
            .iter()
            .copied()
            .find(|e| self.edges[e.0].target == target)
    }

    /// Check if the vertex belongs to this graph
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Smallest id greater than every id in use, for interactive builders
    pub fn next_vertex_id(&self) -> VertexId {
        VertexId(
            self.vertices
                .iter()
                .map(|v| v.id.0 + 1)
                .max()
                .unwrap_or(0),
        )
    }

    /// Dense position of a vertex, stable for the lifetime of the graph
    pub(crate) fn vertex_index(&self, id: VertexId) -> Option<usize> {
        self.index.get(&id).copied()
    }
}
