//! Firing policies
//!
//! A policy decides how a vertex that dropped below threshold redistributes
//! tokens over its out-edges. Policies do not mutate anything themselves:
//! they return a [`FirePlan`], an ordered list of counter mutations and
//! emissions that the scheduler applies step by step. That lets the
//! scheduler abandon the rest of a plan the moment a stop is requested
//! while keeping every step already applied.
//!
//! Three variants exist:
//!
//! - [`ImmediateReset`]: full broadcast on every out-edge, then reset.
//! - [`BoundedIncremental`] (BTW): one token per out-edge until the counter
//!   climbs back to `init_sync`; state carries over between fires.
//! - [`RandomizedThreshold`] (Oslo): like BTW, but against a threshold
//!   freshly drawn around `init_sync` on every fire.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::EngineError;
use super::graph::EdgeId;
use super::threshold::{Color, ThresholdState};

/// How far below `init_sync` a randomized threshold may be drawn
pub const OSLO_JITTER_BELOW: i64 = 3;

/// How far above `init_sync` a randomized threshold may be drawn
pub const OSLO_JITTER_ABOVE: i64 = 1;

/// Policy selector, fixed for the duration of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    #[default]
    ImmediateReset,
    BoundedIncremental,
    RandomizedThreshold,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PolicyKind::ImmediateReset => "immediate-reset",
            PolicyKind::BoundedIncremental => "bounded-incremental",
            PolicyKind::RandomizedThreshold => "randomized-threshold",
        };
        f.write_str(name)
    }
}

impl FromStr for PolicyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" | "immediate-reset" | "reset" => Ok(PolicyKind::ImmediateReset),
            "btw" | "sandpile" | "bounded-incremental" => Ok(PolicyKind::BoundedIncremental),
            "oslo" | "randomized" | "randomized-threshold" => Ok(PolicyKind::RandomizedThreshold),
            other => Err(EngineError::config_error(format!(
                "unknown firing policy: {other}"
            ))),
        }
    }
}

/// A single mutation or emission within a fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireStep {
    /// Shift a channel's counter by `delta`
    Bump { color: Color, delta: i64 },
    /// Increment a channel's counter by one
    Increment(Color),
    /// Set a channel's counter to `value`
    Reset { color: Color, value: i64 },
    /// Place a new token of `color` on `edge`
    Emit { edge: EdgeId, color: Color },
}

/// Ordered redistribution produced by a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirePlan {
    /// Threshold the redistribution was compared against
    pub threshold: i64,
    pub steps: Vec<FireStep>,
}

impl FirePlan {
    fn new(threshold: i64) -> Self {
        Self {
            threshold,
            steps: Vec::new(),
        }
    }

    /// Emissions in plan order
    pub fn emissions(&self) -> impl Iterator<Item = (EdgeId, Color)> + '_ {
        self.steps.iter().filter_map(|step| match step {
            FireStep::Emit { edge, color } => Some((*edge, *color)),
            _ => None,
        })
    }

    /// Number of tokens the plan emits
    pub fn emission_count(&self) -> usize {
        self.emissions().count()
    }
}

/// Strategy selecting how a firing vertex redistributes tokens
pub trait FiringPolicy: Send {
    /// Which variant this is
    fn kind(&self) -> PolicyKind;

    /// Plan the redistribution of a vertex
    ///
    /// `colors` are the channels below threshold, `out_edges` the vertex's
    /// out-edges in graph iteration order.
    fn plan(&mut self, state: &ThresholdState, colors: &[Color], out_edges: &[EdgeId]) -> FirePlan;
}

/// Build the policy for a run
///
/// `seed` makes the randomized policy reproducible; `reset_on_exhaustion`
/// configures the bounded-incremental variant.
pub fn build_policy(
    kind: PolicyKind,
    seed: Option<u64>,
    reset_on_exhaustion: bool,
) -> Box<dyn FiringPolicy> {
    match kind {
        PolicyKind::ImmediateReset => Box::new(ImmediateReset),
        PolicyKind::BoundedIncremental => Box::new(BoundedIncremental {
            reset_on_exhaustion,
        }),
        PolicyKind::RandomizedThreshold => Box::new(match seed {
            Some(seed) => RandomizedThreshold::seeded(seed),
            None => RandomizedThreshold::from_entropy(),
        }),
    }
}

/// Every out-edge receives one token per firing colour, then the firing
/// channels reset to `init_sync`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateReset;

impl FiringPolicy for ImmediateReset {
    fn kind(&self) -> PolicyKind {
        PolicyKind::ImmediateReset
    }

    fn plan(&mut self, state: &ThresholdState, colors: &[Color], out_edges: &[EdgeId]) -> FirePlan {
        let mut plan = FirePlan::new(state.init_sync());
        for &color in colors {
            for &edge in out_edges {
                plan.steps.push(FireStep::Emit { edge, color });
            }
        }
        for &color in colors {
            plan.steps.push(FireStep::Reset {
                color,
                value: state.init_sync(),
            });
        }
        plan
    }
}

/// Sandpile (BTW) redistribution against the fixed `init_sync`
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedIncremental {
    /// Reset the counter when every out-edge was visited without the
    /// counter reaching the threshold
    pub reset_on_exhaustion: bool,
}

impl FiringPolicy for BoundedIncremental {
    fn kind(&self) -> PolicyKind {
        PolicyKind::BoundedIncremental
    }

    fn plan(&mut self, state: &ThresholdState, colors: &[Color], out_edges: &[EdgeId]) -> FirePlan {
        let threshold = state.init_sync();
        let mut plan = FirePlan::new(threshold);
        for &color in colors {
            let counter = state.sync(color);
            incremental_steps(
                &mut plan,
                color,
                counter,
                threshold,
                out_edges,
                self.reset_on_exhaustion.then_some(state.init_sync()),
            );
        }
        plan
    }
}

/// Oslo-style redistribution against a threshold drawn on every fire
#[derive(Debug, Clone)]
pub struct RandomizedThreshold {
    rng: StdRng,
}

impl RandomizedThreshold {
    /// Use the given random source
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Reproducible policy for a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Policy seeded from system entropy
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Inclusive range thresholds are drawn from
    pub fn threshold_range(init_sync: i64) -> (i64, i64) {
        (
            (init_sync - OSLO_JITTER_BELOW).max(1),
            init_sync + OSLO_JITTER_ABOVE,
        )
    }

    /// Draw a threshold uniformly from [`threshold_range`](Self::threshold_range)
    pub fn draw_threshold(&mut self, init_sync: i64) -> i64 {
        let (low, high) = Self::threshold_range(init_sync);
        self.rng.gen_range(low..=high)
    }
}

impl FiringPolicy for RandomizedThreshold {
    fn kind(&self) -> PolicyKind {
        PolicyKind::RandomizedThreshold
    }

    fn plan(&mut self, state: &ThresholdState, colors: &[Color], out_edges: &[EdgeId]) -> FirePlan {
        let threshold = self.draw_threshold(state.init_sync());
        let mut plan = FirePlan::new(threshold);

        let lift = (threshold - state.init_sync()).max(0);
        if lift > 0 {
            for color in Color::ALL {
                plan.steps.push(FireStep::Bump { color, delta: lift });
            }
        }

        for &color in colors {
            let counter = state.sync(color) + lift;
            incremental_steps(&mut plan, color, counter, threshold, out_edges, None);
        }
        plan
    }
}

/// Visit out-edges in order, emitting while the counter is below
/// `threshold` and incrementing once per emission
fn incremental_steps(
    plan: &mut FirePlan,
    color: Color,
    mut counter: i64,
    threshold: i64,
    out_edges: &[EdgeId],
    reset_to: Option<i64>,
) {
    for &edge in out_edges {
        if counter >= threshold {
            return;
        }
        plan.steps.push(FireStep::Increment(color));
        plan.steps.push(FireStep::Emit { edge, color });
        counter += 1;
    }
    if let Some(value) = reset_to {
        if counter < threshold {
            plan.steps.push(FireStep::Reset { color, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(n: usize) -> Vec<EdgeId> {
        (0..n).map(EdgeId).collect()
    }

    fn drained(init_sync: i64, times: usize, color: Color) -> ThresholdState {
        let mut state = ThresholdState::new(init_sync);
        for _ in 0..times {
            state.decrement(color);
        }
        state
    }

    #[test]
    fn test_policy_kind_parse_and_display() {
        assert_eq!("btw".parse::<PolicyKind>().unwrap(), PolicyKind::BoundedIncremental);
        assert_eq!("Oslo".parse::<PolicyKind>().unwrap(), PolicyKind::RandomizedThreshold);
        assert_eq!(
            "immediate-reset".parse::<PolicyKind>().unwrap(),
            PolicyKind::ImmediateReset
        );
        assert!("bogus".parse::<PolicyKind>().is_err());
        assert_eq!(PolicyKind::BoundedIncremental.to_string(), "bounded-incremental");
    }

    #[test]
    fn test_policy_kind_serde() {
        let json = serde_json::to_string(&PolicyKind::RandomizedThreshold).unwrap();
        assert_eq!(json, "\"randomized-threshold\"");
    }

    #[test]
    fn test_immediate_reset_broadcasts_then_resets() {
        let state = drained(2, 2, Color::Blue);
        let plan = ImmediateReset.plan(&state, &[Color::Blue], &edges(3));

        assert_eq!(plan.emission_count(), 3);
        assert_eq!(
            plan.steps.last(),
            Some(&FireStep::Reset {
                color: Color::Blue,
                value: 2
            })
        );
    }

    #[test]
    fn test_bounded_incremental_emits_up_to_deficit() {
        // counter 0, init 3, out-degree 5 -> min(5, 3 - 0) = 3
        let state = drained(3, 3, Color::Blue);
        let plan = BoundedIncremental::default().plan(&state, &[Color::Blue], &edges(5));
        let emitted: Vec<_> = plan.emissions().map(|(e, _)| e).collect();
        assert_eq!(emitted, vec![EdgeId(0), EdgeId(1), EdgeId(2)]);
    }

    #[test]
    fn test_bounded_incremental_limited_by_out_degree() {
        // counter -1, init 4, out-degree 2 -> min(2, 5) = 2, no reset by default
        let state = drained(4, 5, Color::Blue);
        let plan = BoundedIncremental::default().plan(&state, &[Color::Blue], &edges(2));
        assert_eq!(plan.emission_count(), 2);
        assert!(!plan
            .steps
            .iter()
            .any(|s| matches!(s, FireStep::Reset { .. })));
    }

    #[test]
    fn test_bounded_incremental_reset_on_exhaustion() {
        let state = drained(4, 5, Color::Blue);
        let mut policy = BoundedIncremental {
            reset_on_exhaustion: true,
        };
        let plan = policy.plan(&state, &[Color::Blue], &edges(2));
        assert_eq!(
            plan.steps.last(),
            Some(&FireStep::Reset {
                color: Color::Blue,
                value: 4
            })
        );
    }

    #[test]
    fn test_bounded_incremental_threshold_one_still_emits() {
        let state = drained(1, 1, Color::Green);
        let plan = BoundedIncremental::default().plan(&state, &[Color::Green], &edges(4));
        assert_eq!(plan.emission_count(), 1);
        assert_eq!(plan.emissions().next(), Some((EdgeId(0), Color::Green)));
    }

    #[test]
    fn test_randomized_threshold_range() {
        assert_eq!(RandomizedThreshold::threshold_range(1), (1, 2));
        assert_eq!(RandomizedThreshold::threshold_range(5), (2, 6));

        let mut policy = RandomizedThreshold::seeded(7);
        for init in 1..10 {
            for _ in 0..50 {
                let t = policy.draw_threshold(init);
                assert!(t >= (init - 3).max(1) && t <= init + 1);
            }
        }
    }

    #[test]
    fn test_randomized_threshold_is_reproducible() {
        let mut a = RandomizedThreshold::seeded(42);
        let mut b = RandomizedThreshold::seeded(42);
        let state = drained(3, 3, Color::Blue);
        for _ in 0..20 {
            assert_eq!(
                a.plan(&state, &[Color::Blue], &edges(6)),
                b.plan(&state, &[Color::Blue], &edges(6))
            );
        }
    }

    #[test]
    fn test_randomized_threshold_bumps_both_channels() {
        let state = drained(2, 2, Color::Blue);
        let mut policy = RandomizedThreshold::seeded(1);
        for _ in 0..100 {
            let plan = policy.plan(&state, &[Color::Blue], &edges(10));
            let bumps: Vec<_> = plan
                .steps
                .iter()
                .filter_map(|s| match s {
                    FireStep::Bump { color, delta } => Some((*color, *delta)),
                    _ => None,
                })
                .collect();

            if plan.threshold > 2 {
                let lift = plan.threshold - 2;
                assert_eq!(bumps, vec![(Color::Blue, lift), (Color::Green, lift)]);
            } else {
                assert!(bumps.is_empty());
            }
            // Emits until the lifted counter reaches the drawn threshold
            let lifted = (plan.threshold - 2).max(0);
            assert_eq!(plan.emission_count() as i64, plan.threshold - lifted);
        }
    }

    #[test]
    fn test_build_policy_kinds() {
        for kind in [
            PolicyKind::ImmediateReset,
            PolicyKind::BoundedIncremental,
            PolicyKind::RandomizedThreshold,
        ] {
            assert_eq!(build_policy(kind, Some(3), false).kind(), kind);
        }
    }
}
