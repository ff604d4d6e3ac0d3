//! Propagation scheduler
//!
//! A discrete-event process over a virtual clock. Every in-flight token is
//! an entry in a priority queue keyed by its arrival time; arrivals are the
//! only points where cascade logic runs. Travel takes
//! `edge.weight * unit_scale` units of virtual time. Nothing here knows
//! about wall-clock time: the headless driver pops arrivals as fast as it
//! can and the live driver in [`crate::live`] paces them with tokio timers.
//!
//! # State machine
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |          |
//!            v          v
//!         Stopping -> Stopped(reason) -> Running (next start)
//! ```
//!
//! While paused, arrivals that are already due may still be delivered
//! (the live driver catches the clock up on pause), but any redistribution
//! they owe is queued and replayed on resume.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

use super::config::EngineConfig;
use super::error::EngineError;
use super::events::{SimulationObserver, StopReason};
use super::graph::{EdgeId, Graph, VertexId};
use super::policy::{build_policy, FireStep, FiringPolicy, PolicyKind};
use super::statistics::{StatisticsModule, StatsHandle};
use super::threshold::{Color, ThresholdState};

/// Lifecycle state of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// Not started yet
    Idle,
    /// Tokens are travelling
    Running,
    /// Travel time is frozen, redistribution is queued
    Paused,
    /// A stop was requested in the middle of a cascade
    Stopping,
    /// Terminal until the next start
    Stopped(StopReason),
}

impl SimulationState {
    /// Running or paused
    pub fn is_active(&self) -> bool {
        matches!(self, SimulationState::Running | SimulationState::Paused)
    }

    /// Whether the run has ended
    pub fn is_stopped(&self) -> bool {
        matches!(self, SimulationState::Stopped(_))
    }
}

impl std::fmt::Display for SimulationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationState::Idle => write!(f, "idle"),
            SimulationState::Running => write!(f, "running"),
            SimulationState::Paused => write!(f, "paused"),
            SimulationState::Stopping => write!(f, "stopping"),
            SimulationState::Stopped(reason) => write!(f, "stopped ({reason})"),
        }
    }
}

/// A token currently travelling along an edge
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightToken {
    pub edge: EdgeId,
    pub color: Color,
    pub source: VertexId,
    pub target: VertexId,
    pub departed_at: f64,
    pub arrives_at: f64,
    /// Fraction of the edge already travelled, in `[0, 1]`
    pub progress: f64,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    edge: EdgeId,
    color: Color,
    departed_at: f64,
    arrives_at: f64,
}

/// Queue entry; ordered so the earliest arrival pops first from the
/// max-heap, ties broken by emission order
#[derive(Debug, Clone, Copy)]
struct Arrival {
    at: f64,
    seq: u64,
}

impl PartialEq for Arrival {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Arrival {}

impl Ord for Arrival {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .total_cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Arrival {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A simulation over one graph
///
/// Owns the graph, every vertex's threshold state and the statistics of
/// the current run. Runs are started with [`start`](Self::start) and can be
/// restarted after they stop; each start discards the previous statistics.
pub struct Simulation {
    graph: Graph,
    config: EngineConfig,
    state: SimulationState,
    thresholds: Vec<ThresholdState>,
    starting_tokens: BTreeMap<EdgeId, [u32; 2]>,
    policy: Option<Box<dyn FiringPolicy>>,
    statistics: StatisticsModule,
    tokens: BTreeMap<u64, Token>,
    arrivals: BinaryHeap<Arrival>,
    edge_load: Vec<[u32; 2]>,
    queued: VecDeque<VertexId>,
    observers: Vec<Box<dyn SimulationObserver>>,
    clock: f64,
    next_seq: u64,
    ceiling: usize,
    pending_stop: Option<StopReason>,
    events_processed: usize,
    run_id: String,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("run_id", &self.run_id)
            .field("state", &self.state)
            .field("clock", &self.clock)
            .field("in_flight", &self.tokens.len())
            .field("queued", &self.queued.len())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Load a graph
    pub fn new(graph: Graph, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let thresholds = graph
            .vertices()
            .map(|v| ThresholdState::new(v.init_sync))
            .collect();
        let statistics = StatisticsModule::new(&graph);
        let edge_load = vec![[0; 2]; graph.edge_count()];
        Ok(Self {
            graph,
            config,
            state: SimulationState::Idle,
            thresholds,
            starting_tokens: BTreeMap::new(),
            policy: None,
            statistics,
            tokens: BTreeMap::new(),
            arrivals: BinaryHeap::new(),
            edge_load,
            queued: VecDeque::new(),
            observers: Vec::new(),
            clock: 0.0,
            next_seq: 0,
            ceiling: 0,
            pending_stop: None,
            events_processed: 0,
            run_id: String::new(),
        })
    }

    /// Register an observer for this and later runs
    pub fn add_observer(&mut self, observer: impl SimulationObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Place `count` tokens of `color` on `edge` at the next start
    ///
    /// A count of zero clears that colour on the edge.
    pub fn set_starting_tokens(
        &mut self,
        edge: EdgeId,
        color: Color,
        count: u32,
    ) -> Result<(), EngineError> {
        if self.graph.edge(edge).is_none() {
            return Err(EngineError::UnknownEdge(edge));
        }
        let slot = self.starting_tokens.entry(edge).or_insert([0; 2]);
        slot[color.index()] = count;
        if *slot == [0; 2] {
            self.starting_tokens.remove(&edge);
        }
        Ok(())
    }

    /// Seeded edges with their `(blue, green)` counts, by edge id
    pub fn starting_tokens(&self) -> impl Iterator<Item = (EdgeId, u32, u32)> + '_ {
        self.starting_tokens
            .iter()
            .map(|(edge, counts)| (*edge, counts[0], counts[1]))
    }

    /// Forget every starting token
    pub fn clear_starting_tokens(&mut self) {
        self.starting_tokens.clear();
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a run with the given policy
    ///
    /// Valid from `Idle` or `Stopped`. Resets every counter, creates fresh
    /// statistics and places the starting tokens. A run with nothing
    /// seeded drains immediately; a seed above the capacity ceiling stops
    /// before any arrival.
    pub fn start(
        &mut self,
        policy: PolicyKind,
        disable_visual_effects: bool,
    ) -> Result<(), EngineError> {
        if !matches!(self.state, SimulationState::Idle | SimulationState::Stopped(_)) {
            return Err(EngineError::invalid_state("start", self.state));
        }

        self.policy = Some(build_policy(
            policy,
            self.config.seed,
            self.config.reset_on_exhaustion,
        ));
        self.run_id = uuid::Uuid::new_v4().to_string();
        self.statistics = StatisticsModule::new(&self.graph);
        for threshold in &mut self.thresholds {
            threshold.reset_all();
            threshold.clear_anomalies();
        }
        self.clear_in_flight();
        self.clock = 0.0;
        self.next_seq = 0;
        self.events_processed = 0;
        self.pending_stop = None;

        let two_color = self.starting_tokens.values().any(|counts| counts[1] > 0);
        self.ceiling = self
            .config
            .capacity
            .ceiling(disable_visual_effects, two_color);
        self.state = SimulationState::Running;

        tracing::info!(
            run_id = %self.run_id,
            policy = %policy,
            seeded_edges = self.starting_tokens.len(),
            ceiling = self.ceiling,
            "Simulation started"
        );

        let seeds: Vec<(EdgeId, [u32; 2])> = self
            .starting_tokens
            .iter()
            .map(|(edge, counts)| (*edge, *counts))
            .collect();
        'seeding: for (edge, counts) in seeds {
            for color in Color::ALL {
                for _ in 0..counts[color.index()] {
                    self.spawn_token(edge, color);
                    if self.state == SimulationState::Stopping {
                        break 'seeding;
                    }
                }
            }
        }

        self.settle();
        Ok(())
    }

    /// Freeze travel time
    pub fn pause(&mut self) -> Result<(), EngineError> {
        if self.state != SimulationState::Running {
            return Err(EngineError::invalid_state("pause", self.state));
        }
        self.state = SimulationState::Paused;
        self.statistics.mark_paused();
        tracing::info!(run_id = %self.run_id, clock = self.clock, "Simulation paused");
        Ok(())
    }

    /// Unfreeze travel time and replay queued redistribution once each
    pub fn resume(&mut self) -> Result<(), EngineError> {
        if self.state != SimulationState::Paused {
            return Err(EngineError::invalid_state("resume", self.state));
        }
        self.state = SimulationState::Running;
        self.statistics.mark_resumed();
        tracing::info!(
            run_id = %self.run_id,
            queued = self.queued.len(),
            "Simulation resumed"
        );

        while let Some(vertex) = self.queued.pop_front() {
            if self.state != SimulationState::Running {
                break;
            }
            self.fire_vertex(vertex);
        }
        self.settle();
        Ok(())
    }

    /// Cancel every in-flight token and end the run
    ///
    /// Stopping an already stopped run is a no-op.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        match self.state {
            SimulationState::Running | SimulationState::Paused | SimulationState::Stopping => {
                self.finish_stop(StopReason::UserRequested);
                Ok(())
            }
            SimulationState::Stopped(_) => Ok(()),
            SimulationState::Idle => Err(EngineError::invalid_state("stop", self.state)),
        }
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Deliver the next arrival, jumping the clock to it
    ///
    /// Returns `false` when nothing was in flight.
    pub fn step(&mut self) -> Result<bool, EngineError> {
        if self.state != SimulationState::Running {
            return Err(EngineError::invalid_state("step", self.state));
        }
        match self.arrivals.pop() {
            Some(arrival) => {
                self.deliver(arrival);
                Ok(true)
            }
            None => {
                self.settle();
                Ok(false)
            }
        }
    }

    /// Deliver every arrival due at or before `time` and move the clock
    /// there
    ///
    /// Valid while running or paused. Returns the number of arrivals
    /// delivered.
    ///
    /// Calling it while paused is the one way arrivals land during a pause:
    /// the counters drop and any owed fire is queued for [`resume`]. The
    /// live driver never does this; it catches the clock up before pausing
    /// and leaves time frozen until resumed.
    ///
    /// [`resume`]: Simulation::resume
    pub fn advance_to(&mut self, time: f64) -> Result<usize, EngineError> {
        if !self.state.is_active() {
            return Err(EngineError::invalid_state("advance", self.state));
        }
        let mut delivered = 0;
        while self.state.is_active() {
            match self.arrivals.peek() {
                Some(next) if next.at <= time => {}
                _ => break,
            }
            if let Some(arrival) = self.arrivals.pop() {
                self.deliver(arrival);
                delivered += 1;
            }
        }
        if self.state.is_active() && time > self.clock {
            self.clock = time;
        }
        Ok(delivered)
    }

    /// Run headless until the simulation stops
    ///
    /// Fails with [`EngineError::EventLimitExceeded`] once the run has
    /// processed `max_events` arrivals; the simulation is left running so
    /// the caller can inspect or stop it.
    pub fn run_until_stopped(&mut self) -> Result<StopReason, EngineError> {
        loop {
            match self.state {
                SimulationState::Stopped(reason) => return Ok(reason),
                SimulationState::Running => {
                    if self.events_processed >= self.config.max_events {
                        tracing::warn!(
                            run_id = %self.run_id,
                            max_events = self.config.max_events,
                            in_flight = self.tokens.len(),
                            "Event limit reached"
                        );
                        return Err(EngineError::EventLimitExceeded(self.config.max_events));
                    }
                    self.step()?;
                }
                other => return Err(EngineError::invalid_state("run", other)),
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current virtual time
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Identifier of the current (or last) run, empty before the first start
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Policy of the current (or last) run
    pub fn policy_kind(&self) -> Option<PolicyKind> {
        self.policy.as_ref().map(|p| p.kind())
    }

    /// Capacity ceiling of the current run
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Statistics of the current (or last) run
    pub fn statistics(&self) -> &StatisticsModule {
        &self.statistics
    }

    /// Lock-free view of the current run's running totals
    pub fn stats_handle(&self) -> StatsHandle {
        self.statistics.handle()
    }

    /// Live threshold state of a vertex
    pub fn threshold(&self, vertex: VertexId) -> Option<&ThresholdState> {
        self.graph
            .vertex_index(vertex)
            .map(|idx| &self.thresholds[idx])
    }

    /// Arrivals delivered in this run
    pub fn events_processed(&self) -> usize {
        self.events_processed
    }

    /// Redistribution requests waiting for resume
    pub fn queued_redistributions(&self) -> usize {
        self.queued.len()
    }

    /// Virtual time of the next arrival
    pub fn next_arrival_time(&self) -> Option<f64> {
        self.arrivals.peek().map(|a| a.at)
    }

    /// Tokens in flight, in emission order
    pub fn in_flight(&self) -> Vec<InFlightToken> {
        self.tokens
            .values()
            .filter_map(|token| {
                let edge = self.graph.edge(token.edge)?;
                let span = token.arrives_at - token.departed_at;
                let progress = if span > 0.0 {
                    ((self.clock - token.departed_at) / span).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                Some(InFlightToken {
                    edge: token.edge,
                    color: token.color,
                    source: edge.source,
                    target: edge.target,
                    departed_at: token.departed_at,
                    arrives_at: token.arrives_at,
                    progress,
                })
            })
            .collect()
    }

    /// Number of tokens in flight
    pub fn in_flight_count(&self) -> usize {
        self.tokens.len()
    }

    // =========================================================================
    // Cascade
    // =========================================================================

    fn deliver(&mut self, arrival: Arrival) {
        let Some(token) = self.tokens.remove(&arrival.seq) else {
            return;
        };
        if self.state == SimulationState::Stopping {
            return;
        }
        let Some(edge) = self.graph.edge(token.edge) else {
            return;
        };
        let (target, weight) = (edge.target, edge.weight);
        let color = token.color;

        self.clock = self.clock.max(token.arrives_at);
        self.events_processed += 1;
        if let Some(load) = self.edge_load.get_mut(token.edge.0) {
            load[color.index()] = load[color.index()].saturating_sub(1);
        }

        let Some(idx) = self.graph.vertex_index(target) else {
            return;
        };
        let absorbing = self
            .graph
            .vertex(target)
            .map(|v| v.absorbing)
            .unwrap_or(false);

        let mut went_negative = false;
        let mut sync = 0;
        if !absorbing {
            let threshold = &mut self.thresholds[idx];
            went_negative = threshold.decrement(color);
            sync = threshold.sync(color);
        }
        self.statistics.record_arrival(target, color, weight, sync);

        tracing::trace!(
            vertex = %target,
            color = %color,
            sync,
            clock = self.clock,
            "Token arrived"
        );
        self.notify(|o| o.on_token_arrived(target, color));

        if went_negative {
            tracing::warn!(vertex = %target, color = %color, sync, "Negative sync counter");
            self.notify(|o| o.on_negative_sync(target, color, sync));
        }

        if self.cascade_owed(target) {
            match self.state {
                SimulationState::Running => self.fire_vertex(target),
                SimulationState::Paused => {
                    tracing::debug!(vertex = %target, "Redistribution queued while paused");
                    self.queued.push_back(target);
                }
                _ => {}
            }
        }

        self.settle();
    }

    fn cascade_owed(&self, vertex: VertexId) -> bool {
        let Some(idx) = self.graph.vertex_index(vertex) else {
            return false;
        };
        let absorbing = self
            .graph
            .vertex(vertex)
            .map(|v| v.absorbing)
            .unwrap_or(true);
        !absorbing
            && self.thresholds[idx].any_below_threshold()
            && self.graph.has_out_edges(vertex)
    }

    /// Apply the policy's plan for a vertex, step by step
    ///
    /// Does nothing unless the vertex still owes a cascade, so a replayed
    /// request for a vertex that already recovered is dropped.
    fn fire_vertex(&mut self, vertex: VertexId) {
        if self.state != SimulationState::Running || !self.cascade_owed(vertex) {
            return;
        }
        let Some(idx) = self.graph.vertex_index(vertex) else {
            return;
        };
        let colors = self.thresholds[idx].firing_colors();
        let out_edges = self.graph.out_edges(vertex).to_vec();
        let Some(policy) = self.policy.as_mut() else {
            return;
        };
        let plan = policy.plan(&self.thresholds[idx], &colors, &out_edges);

        let mut emitted = Vec::with_capacity(plan.emission_count());
        for step in plan.steps {
            if self.state == SimulationState::Stopping {
                break;
            }
            match step {
                FireStep::Bump { color, delta } => {
                    self.thresholds[idx].bump(color, delta);
                    let sync = self.thresholds[idx].sync(color);
                    self.statistics.record_sync(vertex, color, sync);
                }
                FireStep::Increment(color) => {
                    self.thresholds[idx].increment(color);
                    let sync = self.thresholds[idx].sync(color);
                    self.statistics.record_sync(vertex, color, sync);
                }
                FireStep::Reset { color, value } => {
                    self.thresholds[idx].reset(color, value);
                    self.statistics.record_sync(vertex, color, value);
                }
                FireStep::Emit { edge, color } => {
                    self.spawn_token(edge, color);
                    emitted.push(edge);
                }
            }
        }

        tracing::debug!(
            vertex = %vertex,
            colors = ?colors,
            threshold = plan.threshold,
            emitted = emitted.len(),
            "Vertex fired"
        );
        self.notify(|o| o.on_vertex_fired(vertex, &colors, &emitted));
    }

    fn spawn_token(&mut self, edge_id: EdgeId, color: Color) {
        let Some(edge) = self.graph.edge(edge_id) else {
            return;
        };
        let source = edge.source;
        let travel = edge.weight * self.config.unit_scale;

        let meeting = match self.edge_load.get_mut(edge_id.0) {
            Some(load) => {
                load[color.index()] += 1;
                load[color.other().index()] > 0
            }
            None => false,
        };
        self.statistics.record_emission(source, color, meeting);

        let seq = self.next_seq;
        self.next_seq += 1;
        let arrives_at = self.clock + travel;
        self.tokens.insert(
            seq,
            Token {
                edge: edge_id,
                color,
                departed_at: self.clock,
                arrives_at,
            },
        );
        self.arrivals.push(Arrival {
            at: arrives_at,
            seq,
        });

        let in_flight = self.statistics.current_dot_count();
        if in_flight > self.ceiling as u64 && self.pending_stop.is_none() {
            tracing::warn!(
                run_id = %self.run_id,
                in_flight,
                ceiling = self.ceiling,
                "Capacity exceeded, stopping"
            );
            self.pending_stop = Some(StopReason::CapacityExceeded);
            self.state = SimulationState::Stopping;
        }
    }

    /// Finish a pending stop or detect that the run drained
    fn settle(&mut self) {
        if let Some(reason) = self.pending_stop.take() {
            self.finish_stop(reason);
            return;
        }
        if self.state.is_active() && self.tokens.is_empty() && self.queued.is_empty() {
            self.finish_stop(StopReason::Drained);
        }
    }

    fn finish_stop(&mut self, reason: StopReason) {
        if reason == StopReason::Drained {
            let dead_ends: Vec<VertexId> = self
                .graph
                .vertices()
                .zip(&self.thresholds)
                .filter(|(vertex, threshold)| {
                    self.statistics.is_tracked(vertex.id) && !threshold.is_at_rest()
                })
                .map(|(vertex, _)| vertex.id)
                .collect();
            self.statistics.set_dead_ends(dead_ends);
        }

        if self.state == SimulationState::Paused {
            self.statistics.mark_resumed();
        }
        self.clear_in_flight();
        self.statistics.cancel_in_flight();
        self.pending_stop = None;
        for threshold in &mut self.thresholds {
            threshold.reset_all();
        }
        self.state = SimulationState::Stopped(reason);

        let dead_ends = self.statistics.dead_end_vertices().len();
        if reason.is_capacity_exceeded() {
            tracing::warn!(run_id = %self.run_id, reason = %reason, "Simulation stopped");
        } else {
            tracing::info!(
                run_id = %self.run_id,
                reason = ?reason,
                events = self.events_processed,
                dead_ends,
                "Simulation stopped"
            );
        }
        self.notify(|o| o.on_simulation_stopped(reason));
    }

    fn clear_in_flight(&mut self) {
        self.tokens.clear();
        self.arrivals.clear();
        self.queued.clear();
        for load in &mut self.edge_load {
            *load = [0; 2];
        }
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn SimulationObserver)) {
        for observer in &mut self.observers {
            f(observer.as_mut());
        }
    }
}
