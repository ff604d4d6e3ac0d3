//! Graph generators
//!
//! Both generators take an injected random source so a fixed seed always
//! yields the same graph.

pub mod lattice;
pub mod random;

pub use lattice::{LatticeParams, Tiling};
pub use random::RandomGraphParams;

use rand::Rng;

use crate::engine::{EngineConfig, EngineError, Graph, Simulation};
use crate::error::GenerationError;
use crate::records::{import_starting_edges, StartingEdgeRecord};

/// A generated graph with its starting edges
#[derive(Debug, Clone)]
pub struct GeneratedGraph {
    pub graph: Graph,
    pub starting_edges: Vec<StartingEdgeRecord>,
}

impl GeneratedGraph {
    /// Load the graph into a simulation seeded with the starting edges
    pub fn into_simulation(self, config: EngineConfig) -> Result<Simulation, EngineError> {
        let mut simulation = Simulation::new(self.graph, config)?;
        import_starting_edges(&mut simulation, &self.starting_edges)?;
        Ok(simulation)
    }
}

/// Uniform integer threshold in `[lower, upper]`
pub(crate) fn draw_sync<R: Rng + ?Sized>(rng: &mut R, lower: i64, upper: i64) -> i64 {
    rng.gen_range(lower..=upper)
}

pub(crate) fn check_sync_bounds(lower: i64, upper: i64) -> Result<(), GenerationError> {
    if lower < 1 {
        return Err(GenerationError::invalid_parameter(
            "sync_lower",
            format!("must be at least 1, got {lower}"),
        ));
    }
    if upper < lower {
        return Err(GenerationError::invalid_parameter(
            "sync_upper",
            format!("must not be below sync_lower ({lower}), got {upper}"),
        ));
    }
    Ok(())
}

pub(crate) fn check_weight(name: &'static str, weight: f64) -> Result<(), GenerationError> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(GenerationError::invalid_parameter(
            name,
            format!("must be a positive number, got {weight}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PolicyKind, StopReason};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sync_bounds() {
        assert!(check_sync_bounds(1, 1).is_ok());
        assert!(check_sync_bounds(0, 3).is_err());
        assert!(check_sync_bounds(4, 3).is_err());

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let s = draw_sync(&mut rng, 2, 4);
            assert!((2..=4).contains(&s));
        }
    }

    #[test]
    fn test_weight_check() {
        assert!(check_weight("weight", 0.5).is_ok());
        assert!(check_weight("weight", 0.0).is_err());
        assert!(check_weight("weight", f64::INFINITY).is_err());
    }

    #[test]
    fn test_generated_graph_runs() {
        let mut rng = StdRng::seed_from_u64(11);
        let generated = RandomGraphParams::default().generate(&mut rng).unwrap();
        let seeded = generated.starting_edges.len();
        let config = EngineConfig::new().with_seed(11).with_max_events(100_000);
        let mut sim = generated.into_simulation(config).unwrap();
        assert_eq!(sim.starting_tokens().count(), seeded);

        sim.start(PolicyKind::BoundedIncremental, true).unwrap();
        match sim.run_until_stopped() {
            Ok(reason) => assert_ne!(reason, StopReason::UserRequested),
            Err(e) => assert!(matches!(e, EngineError::EventLimitExceeded(_))),
        }
    }
}
