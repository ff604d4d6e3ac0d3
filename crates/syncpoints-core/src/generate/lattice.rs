//! Regular lattices
//!
//! Lattice vertices sit on a grid and neighbours are joined in both
//! directions with a fixed weight:
//!
//! - squares: `(w + 1) x (h + 1)` grid, horizontal and vertical neighbours
//! - triangles: the square grid plus one diagonal per tile
//! - hexagons: brick-wall layout of `2w + 2` columns, vertical links where
//!   `x + y` is even, pendant corner vertices trimmed
//!
//! With a border cascade, every vertex with fewer neighbours than an
//! interior vertex gets an edge to its own absorbing sink, so tokens can
//! leave the lattice.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{check_sync_bounds, check_weight, draw_sync, GeneratedGraph};
use crate::engine::{Graph, Vertex, VertexId};
use crate::error::GenerationError;
use crate::records::StartingEdgeRecord;

/// Tile shape of a lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tiling {
    Triangle,
    Square,
    Hexagon,
}

impl Tiling {
    pub fn from_polygon_edges(edges: u8) -> Result<Self, GenerationError> {
        match edges {
            3 => Ok(Tiling::Triangle),
            4 => Ok(Tiling::Square),
            6 => Ok(Tiling::Hexagon),
            other => Err(GenerationError::UnsupportedPolygon(other)),
        }
    }

    pub fn polygon_edges(self) -> u8 {
        match self {
            Tiling::Triangle => 3,
            Tiling::Square => 4,
            Tiling::Hexagon => 6,
        }
    }

    /// Neighbours of a vertex away from the border
    pub fn interior_degree(self) -> usize {
        match self {
            Tiling::Triangle => 6,
            Tiling::Square => 4,
            Tiling::Hexagon => 3,
        }
    }
}

/// Parameters of a lattice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeParams {
    /// 3, 4 or 6
    pub polygon_edges: u8,
    pub horizontal_tiles: u32,
    pub vertical_tiles: u32,
    pub create_border_cascade: bool,
    pub sync_lower: i64,
    pub sync_upper: i64,
    pub weight: f64,
    /// Blue tokens placed on the first out-edge of the central vertex
    #[serde(default)]
    pub center_tokens: u32,
}

impl Default for LatticeParams {
    fn default() -> Self {
        Self {
            polygon_edges: 4,
            horizontal_tiles: 10,
            vertical_tiles: 10,
            create_border_cascade: false,
            sync_lower: 4,
            sync_upper: 4,
            weight: 1.0,
            center_tokens: 0,
        }
    }
}

impl LatticeParams {
    pub fn tiling(&self) -> Result<Tiling, GenerationError> {
        Tiling::from_polygon_edges(self.polygon_edges)
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        self.tiling()?;
        if self.horizontal_tiles == 0 {
            return Err(GenerationError::invalid_parameter(
                "horizontal_tiles",
                "must be at least 1",
            ));
        }
        if self.vertical_tiles == 0 {
            return Err(GenerationError::invalid_parameter(
                "vertical_tiles",
                "must be at least 1",
            ));
        }
        check_sync_bounds(self.sync_lower, self.sync_upper)?;
        check_weight("weight", self.weight)
    }

    /// Build the lattice
    ///
    /// Vertex ids run row by row; sinks follow the lattice vertices.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GeneratedGraph, GenerationError> {
        self.validate()?;
        let tiling = self.tiling()?;
        let w = self.horizontal_tiles as usize;
        let h = self.vertical_tiles as usize;
        let (cols, rows) = match tiling {
            Tiling::Hexagon => (2 * w + 2, h + 1),
            Tiling::Triangle | Tiling::Square => (w + 1, h + 1),
        };
        let at = |x: usize, y: usize| y * cols + x;
        let has_vertical = |x: usize, y: usize| match tiling {
            Tiling::Hexagon => (x + y) % 2 == 0,
            Tiling::Triangle | Tiling::Square => true,
        };

        let mut included = vec![true; cols * rows];
        if tiling == Tiling::Hexagon {
            for y in 0..rows {
                for x in [0, cols - 1] {
                    let down = y + 1 < rows && has_vertical(x, y);
                    let up = y > 0 && has_vertical(x, y - 1);
                    if !down && !up {
                        included[at(x, y)] = false;
                    }
                }
            }
        }

        let mut links = Vec::new();
        for y in 0..rows {
            for x in 0..cols {
                let cell = at(x, y);
                if !included[cell] {
                    continue;
                }
                if x + 1 < cols && included[at(x + 1, y)] {
                    links.push((cell, at(x + 1, y)));
                }
                if y + 1 < rows {
                    if has_vertical(x, y) && included[at(x, y + 1)] {
                        links.push((cell, at(x, y + 1)));
                    }
                    if tiling == Tiling::Triangle && x + 1 < cols {
                        links.push((cell, at(x + 1, y + 1)));
                    }
                }
            }
        }

        let mut ids = vec![None; cols * rows];
        let mut next_id = 0u32;
        let mut graph = Graph::new();
        for (cell, slot) in ids.iter_mut().enumerate() {
            if included[cell] {
                let id = VertexId(next_id);
                next_id += 1;
                graph.add_vertex(Vertex::new(id, draw_sync(rng, self.sync_lower, self.sync_upper))?)?;
                *slot = Some(id);
            }
        }

        let mut degree = vec![0usize; cols * rows];
        for &(a, b) in &links {
            let (Some(va), Some(vb)) = (ids[a], ids[b]) else {
                continue;
            };
            graph.add_edge(va, vb, self.weight)?;
            graph.add_edge(vb, va, self.weight)?;
            degree[a] += 1;
            degree[b] += 1;
        }

        let mut sinks = 0;
        if self.create_border_cascade {
            for (cell, id) in ids.iter().enumerate() {
                let Some(id) = *id else {
                    continue;
                };
                if degree[cell] < tiling.interior_degree() {
                    let sink = VertexId(next_id);
                    next_id += 1;
                    graph.add_vertex(Vertex::sink(sink))?;
                    graph.add_edge(id, sink, self.weight)?;
                    sinks += 1;
                }
            }
        }

        let mut starting_edges = Vec::new();
        if self.center_tokens > 0 {
            let center = ids[at(cols / 2, rows / 2)];
            if let Some(edge) = center.and_then(|id| graph.out_edges(id).first().copied()) {
                starting_edges.push(StartingEdgeRecord::blue(edge, self.center_tokens));
            }
        }

        tracing::debug!(
            tiling = ?tiling,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            sinks,
            "Lattice generated"
        );
        Ok(GeneratedGraph {
            graph,
            starting_edges,
        })
    }
}
