//! Engine configuration
//!
//! Travel-time scaling, saturation ceilings, the headless loop guard, the
//! random seed and sampling cadence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::EngineError;

/// In-flight token ceilings that trigger a capacity stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityLimits {
    /// Ceiling while visual effects are enabled
    pub with_effects: usize,

    /// Ceiling when visual effects are disabled
    pub without_effects: usize,

    /// Ceiling for two-colour runs with visual effects disabled
    pub two_color_without_effects: usize,
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self {
            with_effects: 2000,
            without_effects: 4000,
            two_color_without_effects: 5000,
        }
    }
}

impl CapacityLimits {
    /// Ceiling applying to a run
    pub fn ceiling(&self, disable_visual_effects: bool, two_color: bool) -> usize {
        match (disable_visual_effects, two_color) {
            (false, _) => self.with_effects,
            (true, false) => self.without_effects,
            (true, true) => self.two_color_without_effects,
        }
    }
}

/// Propagation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Travel time per unit of edge weight
    pub unit_scale: f64,

    /// Saturation guard ceilings
    pub capacity: CapacityLimits,

    /// Maximum arrivals a headless run may process
    pub max_events: usize,

    /// Seed for the randomized policy (entropy when absent)
    pub seed: Option<u64>,

    /// Bounded-incremental: reset counters when out-edges run out before
    /// the threshold is reached
    pub reset_on_exhaustion: bool,

    /// Interval of the statistics sampler
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unit_scale: 0.5,
            capacity: CapacityLimits::default(),
            max_events: 1_000_000,
            seed: None,
            reset_on_exhaustion: false,
            sample_interval: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the travel time per unit weight
    pub fn with_unit_scale(mut self, scale: f64) -> Self {
        self.unit_scale = scale;
        self
    }

    /// Set the saturation ceilings
    pub fn with_capacity(mut self, capacity: CapacityLimits) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the headless event limit
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Seed the random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Configure the bounded-incremental exhaustion behaviour
    pub fn with_reset_on_exhaustion(mut self, reset: bool) -> Self {
        self.reset_on_exhaustion = reset;
        self
    }

    /// Set the sampler interval
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.unit_scale.is_finite() && self.unit_scale > 0.0) {
            return Err(EngineError::config_error(format!(
                "unit_scale must be positive, got {}",
                self.unit_scale
            )));
        }
        let caps = &self.capacity;
        if caps.with_effects == 0 || caps.without_effects == 0 || caps.two_color_without_effects == 0
        {
            return Err(EngineError::config_error("capacity ceilings must be at least 1"));
        }
        if self.max_events == 0 {
            return Err(EngineError::config_error("max_events must be at least 1"));
        }
        if self.sample_interval.is_zero() {
            return Err(EngineError::config_error("sample_interval must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.unit_scale, 0.5);
        assert_eq!(config.capacity.with_effects, 2000);
        assert_eq!(config.sample_interval, Duration::from_millis(500));
        assert!(config.seed.is_none());
        assert!(!config.reset_on_exhaustion);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_unit_scale(1.0)
            .with_max_events(10)
            .with_seed(9)
            .with_reset_on_exhaustion(true)
            .with_sample_interval(Duration::from_millis(100));
        assert_eq!(config.unit_scale, 1.0);
        assert_eq!(config.max_events, 10);
        assert_eq!(config.seed, Some(9));
        assert!(config.reset_on_exhaustion);
        assert_eq!(config.sample_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_ceiling_selection() {
        let caps = CapacityLimits::default();
        assert_eq!(caps.ceiling(false, false), 2000);
        assert_eq!(caps.ceiling(false, true), 2000);
        assert_eq!(caps.ceiling(true, false), 4000);
        assert_eq!(caps.ceiling(true, true), 5000);
    }

    #[test]
    fn test_validation() {
        assert!(EngineConfig::new().with_unit_scale(0.0).validate().is_err());
        assert!(EngineConfig::new().with_max_events(0).validate().is_err());
        assert!(EngineConfig::new()
            .with_sample_interval(Duration::ZERO)
            .validate()
            .is_err());
        let caps = CapacityLimits {
            with_effects: 0,
            ..CapacityLimits::default()
        };
        assert!(EngineConfig::new().with_capacity(caps).validate().is_err());
    }

    #[test]
    fn test_serde_humantime() {
        let config = EngineConfig::new().with_sample_interval(Duration::from_secs(2));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"2s\""));
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sample_interval, Duration::from_secs(2));
    }
}
