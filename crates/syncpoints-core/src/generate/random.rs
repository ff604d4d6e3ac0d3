//! Random (Erdős–Rényi style) directed graphs

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{check_sync_bounds, check_weight, draw_sync, GeneratedGraph};
use crate::engine::{Graph, Vertex, VertexId};
use crate::error::GenerationError;
use crate::records::StartingEdgeRecord;

/// Parameters of a random graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomGraphParams {
    pub vertex_count: u32,
    /// Chance that an ordered pair of distinct vertices gets an edge, (0, 1]
    pub edge_probability: f64,
    pub sync_lower: i64,
    pub sync_upper: i64,
    pub weight_lower: f64,
    pub weight_upper: f64,
    /// Chance that an edge starts with one blue token, [0, 1]
    pub starting_edge_probability: f64,
}

impl Default for RandomGraphParams {
    fn default() -> Self {
        Self {
            vertex_count: 15,
            edge_probability: 0.4,
            sync_lower: 3,
            sync_upper: 5,
            weight_lower: 1.0,
            weight_upper: 3.0,
            starting_edge_probability: 0.8,
        }
    }
}

impl RandomGraphParams {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.vertex_count == 0 {
            return Err(GenerationError::invalid_parameter(
                "vertex_count",
                "must be at least 1",
            ));
        }
        if !(self.edge_probability > 0.0 && self.edge_probability <= 1.0) {
            return Err(GenerationError::invalid_parameter(
                "edge_probability",
                format!("must be in (0, 1], got {}", self.edge_probability),
            ));
        }
        if !(0.0..=1.0).contains(&self.starting_edge_probability) {
            return Err(GenerationError::invalid_parameter(
                "starting_edge_probability",
                format!("must be in [0, 1], got {}", self.starting_edge_probability),
            ));
        }
        check_sync_bounds(self.sync_lower, self.sync_upper)?;
        check_weight("weight_lower", self.weight_lower)?;
        check_weight("weight_upper", self.weight_upper)?;
        if self.weight_upper < self.weight_lower {
            return Err(GenerationError::invalid_parameter(
                "weight_upper",
                format!(
                    "must not be below weight_lower ({}), got {}",
                    self.weight_lower, self.weight_upper
                ),
            ));
        }
        Ok(())
    }

    /// Draw a graph
    ///
    /// Vertices are numbered from 0. Every ordered pair of distinct
    /// vertices is considered once, sources in ascending order.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GeneratedGraph, GenerationError> {
        self.validate()?;

        let mut graph = Graph::new();
        for id in 0..self.vertex_count {
            let sync = draw_sync(rng, self.sync_lower, self.sync_upper);
            graph.add_vertex(Vertex::new(id, sync)?)?;
        }

        for source in 0..self.vertex_count {
            for target in 0..self.vertex_count {
                if source == target || !rng.gen_bool(self.edge_probability) {
                    continue;
                }
                let weight = rng.gen_range(self.weight_lower..=self.weight_upper);
                graph.add_edge(VertexId(source), VertexId(target), weight)?;
            }
        }

        let starting_edges: Vec<StartingEdgeRecord> = graph
            .edges()
            .filter(|_| rng.gen_bool(self.starting_edge_probability))
            .map(|edge| StartingEdgeRecord::blue(edge.id, 1))
            .collect();

        tracing::debug!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            starting_edges = starting_edges.len(),
            "Random graph generated"
        );
        Ok(GeneratedGraph {
            graph,
            starting_edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_params_valid() {
        assert!(RandomGraphParams::default().validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let base = RandomGraphParams::default();
        let cases = [
            RandomGraphParams {
                vertex_count: 0,
                ..base.clone()
            },
            RandomGraphParams {
                edge_probability: 0.0,
                ..base.clone()
            },
            RandomGraphParams {
                starting_edge_probability: 1.5,
                ..base.clone()
            },
            RandomGraphParams {
                sync_lower: 4,
                sync_upper: 2,
                ..base.clone()
            },
            RandomGraphParams {
                weight_lower: 2.0,
                weight_upper: 1.0,
                ..base.clone()
            },
            RandomGraphParams {
                weight_lower: -1.0,
                ..base
            },
        ];
        for params in cases {
            assert!(
                matches!(params.validate(), Err(GenerationError::InvalidParameter { .. })),
                "{params:?}"
            );
        }
    }

    #[test]
    fn test_complete_graph_at_probability_one() {
        let params = RandomGraphParams {
            vertex_count: 5,
            edge_probability: 1.0,
            starting_edge_probability: 1.0,
            ..RandomGraphParams::default()
        };
        let generated = params.generate(&mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(generated.graph.edge_count(), 5 * 4);
        assert_eq!(generated.starting_edges.len(), 20);
        assert!(generated.graph.edges().all(|e| e.source != e.target));
    }

    #[test]
    fn test_draws_within_bounds() {
        let params = RandomGraphParams {
            vertex_count: 30,
            ..RandomGraphParams::default()
        };
        let generated = params.generate(&mut StdRng::seed_from_u64(5)).unwrap();
        assert!(generated
            .graph
            .vertices()
            .all(|v| (3..=5).contains(&v.init_sync)));
        assert!(generated
            .graph
            .edges()
            .all(|e| (1.0..=3.0).contains(&e.weight)));
    }

    #[test]
    fn test_same_seed_same_graph() {
        let params = RandomGraphParams::default();
        let a = params.generate(&mut StdRng::seed_from_u64(99)).unwrap();
        let b = params.generate(&mut StdRng::seed_from_u64(99)).unwrap();
        let edges = |g: &GeneratedGraph| {
            g.graph
                .edges()
                .map(|e| (e.source, e.target, e.weight))
                .collect::<Vec<_>>()
        };
        assert_eq!(edges(&a), edges(&b));
        assert_eq!(a.starting_edges, b.starting_edges);
    }

    #[test]
    fn test_no_starting_edges_at_zero() {
        let params = RandomGraphParams {
            starting_edge_probability: 0.0,
            ..RandomGraphParams::default()
        };
        let generated = params.generate(&mut StdRng::seed_from_u64(1)).unwrap();
        assert!(generated.starting_edges.is_empty());
    }
}
