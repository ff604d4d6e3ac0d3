//! Statistics aggregator
//!
//! One [`StatisticsModule`] exists per run. The scheduler is its only
//! writer. Running totals live in atomics behind a [`StatsHandle`] so the
//! background sampler and exporters can read them without locking; the
//! per-vertex records stay on the simulation side and are copied out by
//! [`StatisticsModule::snapshot`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::graph::{Graph, VertexId};
use super::threshold::Color;

const NOT_PAUSED: u64 = u64::MAX;

/// Counters shared with readers on other threads
#[derive(Debug)]
struct LiveCounters {
    dot_count: [AtomicU64; 2],
    current_dot_count: [AtomicU64; 2],
    distance_bits: AtomicU64,
    color_meetings: AtomicU64,
    started: Instant,
    paused_nanos: AtomicU64,
    paused_since_nanos: AtomicU64,
}

impl LiveCounters {
    fn new() -> Self {
        Self {
            dot_count: [AtomicU64::new(0), AtomicU64::new(0)],
            current_dot_count: [AtomicU64::new(0), AtomicU64::new(0)],
            distance_bits: AtomicU64::new(0f64.to_bits()),
            color_meetings: AtomicU64::new(0),
            started: Instant::now(),
            paused_nanos: AtomicU64::new(0),
            paused_since_nanos: AtomicU64::new(NOT_PAUSED),
        }
    }

    fn since_start_nanos(&self) -> u64 {
        self.started.elapsed().as_nanos().min(u128::from(u64::MAX - 1)) as u64
    }
}

/// Cheap, cloneable read-only view of a run's running totals
#[derive(Debug, Clone)]
pub struct StatsHandle {
    live: Arc<LiveCounters>,
}

impl StatsHandle {
    /// Tokens generated so far of one colour
    pub fn dot_count(&self, color: Color) -> u64 {
        self.live.dot_count[color.index()].load(Ordering::Relaxed)
    }

    /// Tokens generated so far, all colours
    pub fn total_dot_count(&self) -> u64 {
        Color::ALL.iter().map(|c| self.dot_count(*c)).sum()
    }

    /// Tokens of one colour currently in flight
    pub fn current_dot_count(&self, color: Color) -> u64 {
        self.live.current_dot_count[color.index()].load(Ordering::Relaxed)
    }

    /// Tokens currently in flight, all colours
    pub fn total_current_dot_count(&self) -> u64 {
        Color::ALL.iter().map(|c| self.current_dot_count(*c)).sum()
    }

    /// Sum of the weights of every completed traversal
    pub fn distance_travelled(&self) -> f64 {
        f64::from_bits(self.live.distance_bits.load(Ordering::Relaxed))
    }

    /// Times a token joined an edge carrying a token of the other colour
    pub fn color_meetings(&self) -> u64 {
        self.live.color_meetings.load(Ordering::Relaxed)
    }

    /// Accumulated paused wall-clock time, including an ongoing pause
    pub fn paused_time(&self) -> Duration {
        let settled = self.live.paused_nanos.load(Ordering::Relaxed);
        let since = self.live.paused_since_nanos.load(Ordering::Relaxed);
        let ongoing = if since == NOT_PAUSED {
            0
        } else {
            self.live.since_start_nanos().saturating_sub(since)
        };
        Duration::from_nanos(settled.saturating_add(ongoing))
    }

    /// Wall-clock time since the run started, minus paused time
    pub fn time_elapsed(&self) -> Duration {
        self.live
            .started
            .elapsed()
            .saturating_sub(self.paused_time())
    }

    /// Whether the run is currently paused
    pub fn is_paused(&self) -> bool {
        self.live.paused_since_nanos.load(Ordering::Relaxed) != NOT_PAUSED
    }
}

/// Per-vertex token flow and sync history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VertexData {
    pub vertex_id: VertexId,
    pub blue_dots_in: u64,
    pub blue_dots_out: u64,
    pub green_dots_in: u64,
    pub green_dots_out: u64,
    /// Every blue counter value, starting with `init_sync`
    pub blue_sync_history: Vec<i64>,
    /// Every green counter value, starting with `init_sync`
    pub green_sync_history: Vec<i64>,
}

impl VertexData {
    /// Fresh record for a vertex resting at `init_sync`
    pub fn new(vertex_id: VertexId, init_sync: i64) -> Self {
        Self {
            vertex_id,
            blue_dots_in: 0,
            blue_dots_out: 0,
            green_dots_in: 0,
            green_dots_out: 0,
            blue_sync_history: vec![init_sync],
            green_sync_history: vec![init_sync],
        }
    }

    /// Tokens of `color` that arrived here
    pub fn dots_in(&self, color: Color) -> u64 {
        match color {
            Color::Blue => self.blue_dots_in,
            Color::Green => self.green_dots_in,
        }
    }

    /// Tokens of `color` that left here
    pub fn dots_out(&self, color: Color) -> u64 {
        match color {
            Color::Blue => self.blue_dots_out,
            Color::Green => self.green_dots_out,
        }
    }

    /// Counter history of `color`
    pub fn sync_history(&self, color: Color) -> &[i64] {
        match color {
            Color::Blue => &self.blue_sync_history,
            Color::Green => &self.green_sync_history,
        }
    }

    fn dots_in_mut(&mut self, color: Color) -> &mut u64 {
        match color {
            Color::Blue => &mut self.blue_dots_in,
            Color::Green => &mut self.green_dots_in,
        }
    }

    fn dots_out_mut(&mut self, color: Color) -> &mut u64 {
        match color {
            Color::Blue => &mut self.blue_dots_out,
            Color::Green => &mut self.green_dots_out,
        }
    }

    fn history_mut(&mut self, color: Color) -> &mut Vec<i64> {
        match color {
            Color::Blue => &mut self.blue_sync_history,
            Color::Green => &mut self.green_sync_history,
        }
    }
}

/// Flat export record of a run's statistics
///
/// Paused time is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatisticsSnapshot {
    pub dot_count: u64,
    pub blue_dot_count: u64,
    pub green_dot_count: u64,
    pub current_dot_count: u64,
    pub current_blue_dot_count: u64,
    pub current_green_dot_count: u64,
    pub distance_travelled: f64,
    pub color_meetings: u64,
    #[serde(with = "humantime_serde")]
    pub time_elapsed: Duration,
    pub vertex_statistics: Vec<VertexData>,
    pub dead_end_vertices: Vec<VertexId>,
}

/// Statistics of a single run
#[derive(Debug)]
pub struct StatisticsModule {
    live: Arc<LiveCounters>,
    vertex_statistics: BTreeMap<VertexId, VertexData>,
    dead_end_vertices: Vec<VertexId>,
    absorbed_dots: u64,
}

impl StatisticsModule {
    /// Start statistics for a run over `graph`; absorbing vertices are not
    /// tracked
    pub fn new(graph: &Graph) -> Self {
        let vertex_statistics = graph
            .vertices()
            .filter(|v| !v.absorbing)
            .map(|v| (v.id, VertexData::new(v.id, v.init_sync)))
            .collect();
        Self {
            live: Arc::new(LiveCounters::new()),
            vertex_statistics,
            dead_end_vertices: Vec::new(),
            absorbed_dots: 0,
        }
    }

    /// Read-only handle for concurrent readers
    pub fn handle(&self) -> StatsHandle {
        StatsHandle {
            live: Arc::clone(&self.live),
        }
    }

    /// Record for a tracked vertex
    pub fn vertex_data(&self, id: VertexId) -> Option<&VertexData> {
        self.vertex_statistics.get(&id)
    }

    /// All tracked vertices ordered by id
    pub fn vertex_statistics(&self) -> impl Iterator<Item = &VertexData> {
        self.vertex_statistics.values()
    }

    /// Whether statistics are kept for the vertex
    pub fn is_tracked(&self, id: VertexId) -> bool {
        self.vertex_statistics.contains_key(&id)
    }

    /// Vertices classified as dead ends when the run drained
    pub fn dead_end_vertices(&self) -> &[VertexId] {
        &self.dead_end_vertices
    }

    /// Sum of `dots_out` over tracked vertices, all colours
    pub fn total_dots_out(&self) -> u64 {
        self.vertex_statistics
            .values()
            .map(|d| d.blue_dots_out + d.green_dots_out)
            .sum()
    }

    /// Sum of `dots_in` over tracked vertices, all colours
    pub fn total_dots_in(&self) -> u64 {
        self.vertex_statistics
            .values()
            .map(|d| d.blue_dots_in + d.green_dots_in)
            .sum()
    }

    /// Tokens swallowed by untracked (absorbing) vertices
    pub fn absorbed_dots(&self) -> u64 {
        self.absorbed_dots
    }

    /// Tokens currently in flight, all colours
    pub fn current_dot_count(&self) -> u64 {
        Color::ALL
            .iter()
            .map(|c| self.live.current_dot_count[c.index()].load(Ordering::Relaxed))
            .sum()
    }

    /// Copy the running totals and per-vertex records
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let handle = self.handle();
        StatisticsSnapshot {
            dot_count: handle.total_dot_count(),
            blue_dot_count: handle.dot_count(Color::Blue),
            green_dot_count: handle.dot_count(Color::Green),
            current_dot_count: handle.total_current_dot_count(),
            current_blue_dot_count: handle.current_dot_count(Color::Blue),
            current_green_dot_count: handle.current_dot_count(Color::Green),
            distance_travelled: handle.distance_travelled(),
            color_meetings: handle.color_meetings(),
            time_elapsed: handle.time_elapsed(),
            vertex_statistics: self.vertex_statistics.values().cloned().collect(),
            dead_end_vertices: self.dead_end_vertices.clone(),
        }
    }

    /// A token left `source` on an edge
    pub(crate) fn record_emission(&mut self, source: VertexId, color: Color, meeting: bool) {
        self.live.dot_count[color.index()].fetch_add(1, Ordering::Relaxed);
        self.live.current_dot_count[color.index()].fetch_add(1, Ordering::Relaxed);
        if meeting {
            self.live.color_meetings.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(data) = self.vertex_statistics.get_mut(&source) {
            *data.dots_out_mut(color) += 1;
        }
    }

    /// A token reached `target` after travelling `weight`; `sync` is the
    /// target's counter after the decrement
    pub(crate) fn record_arrival(&mut self, target: VertexId, color: Color, weight: f64, sync: i64) {
        let _ = self.live.current_dot_count[color.index()].fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |n| n.checked_sub(1),
        );
        let _ = self
            .live
            .distance_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + weight).to_bits())
            });
        match self.vertex_statistics.get_mut(&target) {
            Some(data) => {
                *data.dots_in_mut(color) += 1;
                data.history_mut(color).push(sync);
            }
            None => self.absorbed_dots += 1,
        }
    }

    /// A counter changed outside of an arrival
    pub(crate) fn record_sync(&mut self, vertex: VertexId, color: Color, sync: i64) {
        if let Some(data) = self.vertex_statistics.get_mut(&vertex) {
            data.history_mut(color).push(sync);
        }
    }

    pub(crate) fn mark_paused(&self) {
        let now = self.live.since_start_nanos();
        let _ = self.live.paused_since_nanos.compare_exchange(
            NOT_PAUSED,
            now,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    pub(crate) fn mark_resumed(&self) {
        let since = self
            .live
            .paused_since_nanos
            .swap(NOT_PAUSED, Ordering::Relaxed);
        if since != NOT_PAUSED {
            let paused = self.live.since_start_nanos().saturating_sub(since);
            self.live.paused_nanos.fetch_add(paused, Ordering::Relaxed);
        }
    }

    pub(crate) fn set_dead_ends(&mut self, dead_ends: Vec<VertexId>) {
        self.dead_end_vertices = dead_ends;
    }

    /// Every in-flight token was cancelled without arriving
    pub(crate) fn cancel_in_flight(&self) {
        for count in &self.live.current_dot_count {
            count.store(0, Ordering::Relaxed);
        }
    }
}
