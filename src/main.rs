//! # SyncPoints
//!
//! A chip-firing (sandpile) simulator: tokens travel along the weighted
//! edges of a directed graph, and a vertex that collects enough of them
//! fires new tokens onto its out-edges.
//!
//! This application demonstrates:
//! - A workspace with the engine in its own library crate
//! - CLI design with clap subcommands
//! - Structured logging with tracing
//! - Live runs on tokio with Ctrl-C handling
//!
//! ## Quick Start
//! ```bash
//! cargo run -- generate random --seed 7 --out scenario.json
//! cargo run -- run scenario.json --policy btw
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Scenario files, generation and runs
mod commands;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use syncpoints_core::{LatticeParams, PolicyKind, RandomGraphParams};

use crate::commands::{Generator, Scenario};
use crate::config::Config;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
/// # Rust Concept: Subcommands with Clap
///
/// An enum deriving `Subcommand` turns each variant into a subcommand;
/// variants can nest further subcommands, as `generate` does.
#[derive(Parser, Debug)]
#[command(
    name = "syncpoints",
    version = "0.1.0",
    about = "Chip-firing token propagation on directed weighted graphs",
    long_about = r#"
SyncPoints - sandpile cascades on weighted graphs

Every vertex has a threshold. Tokens travel along edges for a time
proportional to the edge weight; a vertex that drops below its threshold
fires tokens onto its out-edges according to the chosen policy:

  immediate  every out-edge gets a token, then the vertex resets
  btw        one token per out-edge until the vertex is back at threshold
  oslo       like btw, against a threshold redrawn on every fire

EXAMPLES:
  # Random graph, reproducible
  syncpoints generate random --vertices 20 --seed 7 --out scenario.json

  # Square lattice leaking into border sinks, 30 tokens in the middle
  syncpoints generate lattice --polygon 4 --width 8 --height 8 --border --center-tokens 30 --out grid.json

  # Headless run with statistics export
  syncpoints run grid.json --policy btw --stats-out stats.json

  # Watch it live at 5x speed
  syncpoints run grid.json --policy oslo --live --speed 5
"#
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (debug logging)
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable verbose/debug logging",
        default_value = "false",
        global = true
    )]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a scenario file
    Generate {
        #[command(subcommand)]
        kind: GenerateKind,

        /// Seed for reproducible graphs (overrides SYNCPOINTS_SEED)
        #[arg(long, global = true)]
        seed: Option<u64>,

        /// Output file; stdout when omitted
        #[arg(short = 'o', long, global = true, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Run a scenario and report statistics
    Run(RunArgs),
}

#[derive(Subcommand, Debug)]
enum GenerateKind {
    /// Random directed graph
    Random(RandomArgs),
    /// Triangle, square or hexagon lattice
    Lattice(LatticeArgs),
}

#[derive(Args, Debug)]
struct RandomArgs {
    #[arg(long, default_value_t = 15)]
    vertices: u32,
    /// Chance of an edge for every ordered vertex pair
    #[arg(long, default_value_t = 0.4)]
    edge_probability: f64,
    #[arg(long, default_value_t = 3)]
    sync_lower: i64,
    #[arg(long, default_value_t = 5)]
    sync_upper: i64,
    #[arg(long, default_value_t = 1.0)]
    weight_lower: f64,
    #[arg(long, default_value_t = 3.0)]
    weight_upper: f64,
    /// Chance of an edge starting with one blue token
    #[arg(long, default_value_t = 0.8)]
    starting_probability: f64,
}

impl From<RandomArgs> for RandomGraphParams {
    fn from(args: RandomArgs) -> Self {
        Self {
            vertex_count: args.vertices,
            edge_probability: args.edge_probability,
            sync_lower: args.sync_lower,
            sync_upper: args.sync_upper,
            weight_lower: args.weight_lower,
            weight_upper: args.weight_upper,
            starting_edge_probability: args.starting_probability,
        }
    }
}

#[derive(Args, Debug)]
struct LatticeArgs {
    /// Edges per tile: 3, 4 or 6
    #[arg(long, default_value_t = 4)]
    polygon: u8,
    #[arg(long, default_value_t = 10)]
    width: u32,
    #[arg(long, default_value_t = 10)]
    height: u32,
    /// Connect border vertices to absorbing sinks
    #[arg(long)]
    border: bool,
    #[arg(long, default_value_t = 4)]
    sync_lower: i64,
    #[arg(long, default_value_t = 4)]
    sync_upper: i64,
    #[arg(long, default_value_t = 1.0)]
    weight: f64,
    /// Blue tokens starting next to the centre vertex
    #[arg(long, default_value_t = 0)]
    center_tokens: u32,
}

impl From<LatticeArgs> for LatticeParams {
    fn from(args: LatticeArgs) -> Self {
        Self {
            polygon_edges: args.polygon,
            horizontal_tiles: args.width,
            vertical_tiles: args.height,
            create_border_cascade: args.border,
            sync_lower: args.sync_lower,
            sync_upper: args.sync_upper,
            weight: args.weight,
            center_tokens: args.center_tokens,
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Scenario file written by `generate`
    #[arg(value_name = "SCENARIO")]
    scenario: PathBuf,

    /// Starting-edge list replacing the scenario's own
    #[arg(long, value_name = "FILE")]
    starts: Option<PathBuf>,

    /// Firing policy: immediate, btw or oslo
    #[arg(short = 'p', long, default_value = "immediate", env = "SYNCPOINTS_POLICY")]
    policy: PolicyKind,

    /// Pace the run against the wall clock
    #[arg(long)]
    live: bool,

    /// Speed exponent for live runs (overrides SYNCPOINTS_SPEED)
    #[arg(long, allow_negative_numbers = true)]
    speed: Option<f64>,

    /// Raise the in-flight token ceiling
    #[arg(long)]
    disable_effects: bool,

    /// Seed for the oslo policy (overrides SYNCPOINTS_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Write the statistics snapshot as JSON
    #[arg(long, value_name = "FILE")]
    stats_out: Option<PathBuf>,

    /// Write the sampled chart series as JSON (live runs)
    #[arg(long, value_name = "FILE")]
    samples_out: Option<PathBuf>,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut config = Config::from_env()?;

    let result = match cli.command {
        Command::Generate { kind, seed, out } => {
            if seed.is_some() {
                config.seed = seed;
            }
            config.validate()?;
            let generator = match kind {
                GenerateKind::Random(args) => Generator::Random(args.into()),
                GenerateKind::Lattice(args) => Generator::Lattice(args.into()),
            };
            commands::generate(&generator, config.seed)
                .and_then(|scenario| commands::write_json(out.as_deref(), &scenario))
        }
        Command::Run(args) => run(args, config).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
        eprintln!("\nError: {:#}", e);
    }
    result
}

async fn run(args: RunArgs, mut config: Config) -> Result<()> {
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(speed) = args.speed {
        config.speed = speed;
    }
    config.validate()?;

    let starts = args
        .starts
        .as_deref()
        .map(commands::load_starts)
        .transpose()?;
    let simulation = Scenario::load(&args.scenario)?.into_simulation(config.engine_config(), starts)?;
    info!(
        scenario = %args.scenario.display(),
        policy = %args.policy,
        live = args.live,
        "Running scenario"
    );

    let report = if args.live {
        commands::run_live(
            simulation,
            args.policy,
            args.disable_effects,
            config.live_options(),
            config.sample_interval,
        )
        .await?
    } else {
        commands::run_headless(simulation, args.policy, args.disable_effects)?
    };

    println!("\n{}", "=".repeat(60));
    println!("{}", commands::summary(&report));
    println!("{}", "=".repeat(60));

    if let Some(path) = &args.stats_out {
        commands::write_json(Some(path), &report.statistics)?;
        info!(path = %path.display(), "Statistics written");
    }
    if let Some(path) = &args.samples_out {
        commands::write_json(Some(path), &report.samples)?;
        info!(path = %path.display(), samples = report.samples.len(), "Samples written");
    }
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber for structured logging.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
