//! # Commands Module
//!
//! The work behind each subcommand: generating scenarios, loading them
//! from disk and running them headless or live.
//! It demonstrates several important Rust patterns:
//! - Serde records as a file format
//! - Spawned tasks and signals with tokio
//! - `anyhow::Context` on every I/O boundary

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use syncpoints_core::{
    import_starting_edges, spawn_live, spawn_sampler, EngineConfig, EngineError, GeneratedGraph,
    GraphDocument, LatticeParams, LiveOptions, PolicyKind, RandomGraphParams, Simulation,
    StartingEdgeRecord, StatisticsSnapshot, StatsSample, StopReason,
};

// =============================================================================
// SCENARIO FILE
// =============================================================================
/// A graph together with the tokens it starts with.
///
/// This is what `generate` writes and `run` reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub graph: GraphDocument,
    #[serde(default)]
    pub starting_edges: Vec<StartingEdgeRecord>,
}

impl From<GeneratedGraph> for Scenario {
    fn from(generated: GeneratedGraph) -> Self {
        Self {
            graph: GraphDocument::from_graph(&generated.graph),
            starting_edges: generated.starting_edges,
        }
    }
}

impl Scenario {
    /// Read a scenario from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed scenario {}", path.display()))
    }

    /// Build a simulation seeded with this scenario's starting edges.
    ///
    /// `starts` replaces the embedded starting edges when given.
    pub fn into_simulation(
        self,
        config: EngineConfig,
        starts: Option<Vec<StartingEdgeRecord>>,
    ) -> Result<Simulation> {
        let graph = self.graph.to_graph().context("Invalid graph")?;
        let mut simulation = Simulation::new(graph, config)?;
        let records = starts.unwrap_or(self.starting_edges);
        import_starting_edges(&mut simulation, &records).context("Invalid starting edges")?;
        Ok(simulation)
    }
}

/// Read a starting-edge list from a JSON file
pub fn load_starts(path: &Path) -> Result<Vec<StartingEdgeRecord>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read starting edges {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed starting edges {}", path.display()))
}

/// Write `value` as pretty JSON to `path`, or to stdout when `None`
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

// =============================================================================
// GENERATION
// =============================================================================
/// Which generator to run
#[derive(Debug, Clone)]
pub enum Generator {
    Random(RandomGraphParams),
    Lattice(LatticeParams),
}

/// Random source: fixed seed when given, system entropy otherwise
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Run a generator into a scenario
pub fn generate(generator: &Generator, seed: Option<u64>) -> Result<Scenario> {
    let mut rng = seeded_rng(seed);
    let generated = match generator {
        Generator::Random(params) => params
            .generate(&mut rng)
            .context("Random graph generation failed")?,
        Generator::Lattice(params) => params
            .generate(&mut rng)
            .context("Lattice generation failed")?,
    };
    info!(
        vertices = generated.graph.vertex_count(),
        edges = generated.graph.edge_count(),
        starting_edges = generated.starting_edges.len(),
        "Scenario generated"
    );
    Ok(generated.into())
}

// =============================================================================
// RUNNING
// =============================================================================
/// Everything a finished run reports
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub reason: StopReason,
    pub statistics: StatisticsSnapshot,
    /// Chart series; empty for headless runs
    pub samples: Vec<StatsSample>,
}

/// Run to completion on the virtual clock, without pacing
pub fn run_headless(
    mut simulation: Simulation,
    policy: PolicyKind,
    disable_visual_effects: bool,
) -> Result<RunReport> {
    simulation.start(policy, disable_visual_effects)?;
    let outcome = simulation.run_until_stopped();
    let reason = finish_headless(&mut simulation, outcome)?;
    Ok(RunReport {
        run_id: simulation.run_id().to_string(),
        reason,
        statistics: simulation.statistics().snapshot(),
        samples: Vec::new(),
    })
}

/// Cut an endless run at the event limit and keep its partial statistics;
/// any other engine error fails the command
fn finish_headless(
    simulation: &mut Simulation,
    outcome: Result<StopReason, EngineError>,
) -> Result<StopReason> {
    match outcome {
        Ok(reason) => Ok(reason),
        Err(EngineError::EventLimitExceeded(limit)) => {
            warn!(max_events = limit, "Event limit reached, stopping run early");
            simulation.stop()?;
            Ok(StopReason::UserRequested)
        }
        Err(e) => Err(e).context("Headless run failed"),
    }
}

/// Run paced against the wall clock, sampling the token counts.
///
/// Ctrl-C stops the run; the report still covers everything up to then.
pub async fn run_live(
    simulation: Simulation,
    policy: PolicyKind,
    disable_visual_effects: bool,
    options: LiveOptions,
    sample_interval: Duration,
) -> Result<RunReport> {
    let handle = spawn_live(simulation, policy, disable_visual_effects, options)?;
    let run_id = handle.run_id().to_string();
    let sampler = spawn_sampler(handle.stats(), sample_interval, None);

    let controls = handle.controls();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping run");
            let _ = controls.stop();
        }
    });

    let outcome = handle.join().await?;
    interrupt.abort();
    let samples = sampler.stop().await?;

    Ok(RunReport {
        run_id,
        reason: outcome.reason,
        statistics: outcome.snapshot,
        samples,
    })
}

/// Human-readable summary of a report
pub fn summary(report: &RunReport) -> String {
    let stats = &report.statistics;
    let mut lines = vec![
        format!("Run {} stopped: {}", report.run_id, report.reason),
        format!(
            "Tokens emitted: {} (blue {}, green {})",
            stats.dot_count, stats.blue_dot_count, stats.green_dot_count
        ),
        format!("Distance travelled: {:.2}", stats.distance_travelled),
        format!("Colour meetings: {}", stats.color_meetings),
    ];
    if stats.dead_end_vertices.is_empty() {
        lines.push("Dead ends: none".to_string());
    } else {
        let ids: Vec<String> = stats
            .dead_end_vertices
            .iter()
            .map(ToString::to_string)
            .collect();
        lines.push(format!("Dead ends: {}", ids.join(", ")));
    }
    lines.join("\n")
}
