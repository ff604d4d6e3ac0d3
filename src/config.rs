//! # Configuration Module
//!
//! This module loads engine settings from environment variables (and a
//! `.env` file when present) and turns them into the engine's own
//! configuration types.
//! It demonstrates several important Rust patterns:
//! - The Default trait for sensible defaults
//! - Error handling with Result types and `.context()`
//! - Closures as injectable lookups for testable environment access

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use syncpoints_core::live::speed_ratio;
use syncpoints_core::{EngineConfig, LiveOptions};

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Runtime configuration of the simulator.
///
/// Everything here has a command-line counterpart; flags win over the
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds of travel per unit of edge weight
    pub unit_scale: f64,

    /// Seed for graph generation and the randomized policy
    pub seed: Option<u64>,

    /// Headless loop guard
    pub max_events: usize,

    /// How often the live sampler records a chart point
    pub sample_interval: Duration,

    /// Speed exponent of live runs (0 = real time)
    pub speed: f64,

    /// Reset a bounded-incremental counter that ran out of out-edges
    pub reset_on_exhaustion: bool,
}

// =============================================================================
// DEFAULT IMPLEMENTATION
// =============================================================================
impl Default for Config {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            unit_scale: engine.unit_scale,
            seed: engine.seed,
            max_events: engine.max_events,
            sample_interval: engine.sample_interval,
            speed: 0.0,
            reset_on_exhaustion: engine.reset_on_exhaustion,
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// Reads `.env` first (silently ignored when missing), then
    /// `SYNCPOINTS_UNIT_SCALE`, `SYNCPOINTS_SEED`, `SYNCPOINTS_MAX_EVENTS`,
    /// `SYNCPOINTS_SAMPLE_INTERVAL_MS`, `SYNCPOINTS_SPEED` and
    /// `SYNCPOINTS_RESET_ON_EXHAUSTION`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup.
    ///
    /// # Rust Concept: Generic Closures
    ///
    /// Taking `impl Fn(&str) -> Option<String>` instead of reading the
    /// process environment directly lets tests pass a plain map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(val) = lookup("SYNCPOINTS_UNIT_SCALE") {
            config.unit_scale = val
                .parse()
                .context("SYNCPOINTS_UNIT_SCALE must be a positive number (e.g., 0.5)")?;
        }

        if let Some(val) = lookup("SYNCPOINTS_SEED") {
            config.seed = Some(
                val.parse()
                    .context("SYNCPOINTS_SEED must be an unsigned integer")?,
            );
        }

        if let Some(val) = lookup("SYNCPOINTS_MAX_EVENTS") {
            config.max_events = val
                .parse()
                .context("SYNCPOINTS_MAX_EVENTS must be a positive integer")?;
        }

        if let Some(val) = lookup("SYNCPOINTS_SAMPLE_INTERVAL_MS") {
            let millis: u64 = val
                .parse()
                .context("SYNCPOINTS_SAMPLE_INTERVAL_MS must be a number of milliseconds")?;
            config.sample_interval = Duration::from_millis(millis);
        }

        if let Some(val) = lookup("SYNCPOINTS_SPEED") {
            config.speed = val
                .parse()
                .context("SYNCPOINTS_SPEED must be a number (e.g., 2 or -1.5)")?;
        }

        if let Some(val) = lookup("SYNCPOINTS_RESET_ON_EXHAUSTION") {
            config.reset_on_exhaustion = val
                .parse()
                .context("SYNCPOINTS_RESET_ON_EXHAUSTION must be true or false")?;
        }

        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Engine-level checks are delegated to [`EngineConfig::validate`] so
    /// the rules live in one place.
    pub fn validate(&self) -> Result<()> {
        self.engine_config()
            .validate()
            .context("Invalid engine configuration")?;

        if !self.speed.is_finite() {
            anyhow::bail!("Speed must be a finite number, got: {}", self.speed);
        }
        if !speed_ratio(self.speed).is_normal() {
            anyhow::bail!("Speed {} is out of range", self.speed);
        }

        Ok(())
    }

    /// Engine configuration for a simulation
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::new()
            .with_unit_scale(self.unit_scale)
            .with_max_events(self.max_events)
            .with_sample_interval(self.sample_interval)
            .with_reset_on_exhaustion(self.reset_on_exhaustion);
        if let Some(seed) = self.seed {
            engine = engine.with_seed(seed);
        }
        engine
    }

    /// Pacing of live runs; one unit of virtual time is one wall second
    pub fn live_options(&self) -> LiveOptions {
        LiveOptions::default().with_speed(self.speed)
    }
}
