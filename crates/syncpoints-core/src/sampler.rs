//! Background statistics sampler
//!
//! Polls in-flight counts at a fixed wall-clock interval to build the
//! chart series of a run. It only reads the lock-free [`StatsHandle`], so
//! it never blocks the simulation. Sampling is cooperative: the task checks
//! a shared `keep_sampling` flag on every tick and skips ticks while the
//! run is paused.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::engine::{Color, EngineError, StatsHandle};

/// One point of the chart series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSample {
    #[serde(with = "humantime_serde")]
    pub time_elapsed: Duration,
    /// Blue tokens in flight
    pub blue: u64,
    /// Green tokens in flight
    pub green: u64,
}

impl StatsSample {
    fn read(stats: &StatsHandle, time_elapsed: Duration) -> Self {
        Self {
            time_elapsed,
            blue: stats.current_dot_count(Color::Blue),
            green: stats.current_dot_count(Color::Green),
        }
    }

    pub fn total(&self) -> u64 {
        self.blue + self.green
    }
}

/// Handle to a running sampler
#[derive(Debug)]
pub struct SamplerHandle {
    keep_sampling: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<Vec<StatsSample>>,
}

impl SamplerHandle {
    /// The flag the sampler checks on every tick
    pub fn keep_sampling(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.keep_sampling)
    }

    /// Stop sampling and return the collected series
    pub async fn stop(self) -> Result<Vec<StatsSample>, EngineError> {
        self.keep_sampling.store(false, Ordering::Relaxed);
        self.wake.notify_one();
        self.task
            .await
            .map_err(|e| EngineError::Driver(e.to_string()))
    }
}

/// Spawn a sampler over `stats`
///
/// The first point is `(0, current counts)`, taken immediately. Every
/// sample is also sent to `sink` when one is given; a closed sink is
/// ignored. Must be called within a tokio runtime.
pub fn spawn_sampler(
    stats: StatsHandle,
    interval: Duration,
    sink: Option<mpsc::UnboundedSender<StatsSample>>,
) -> SamplerHandle {
    let keep_sampling = Arc::new(AtomicBool::new(true));
    let wake = Arc::new(Notify::new());
    let task = tokio::spawn(sample_loop(
        stats,
        interval,
        sink,
        Arc::clone(&keep_sampling),
        Arc::clone(&wake),
    ));
    SamplerHandle {
        keep_sampling,
        wake,
        task,
    }
}

async fn sample_loop(
    stats: StatsHandle,
    interval: Duration,
    sink: Option<mpsc::UnboundedSender<StatsSample>>,
    keep_sampling: Arc<AtomicBool>,
    wake: Arc<Notify>,
) -> Vec<StatsSample> {
    let mut samples = Vec::new();
    let record = |sample: StatsSample, samples: &mut Vec<StatsSample>| {
        if let Some(sink) = &sink {
            let _ = sink.send(sample);
        }
        samples.push(sample);
    };

    record(StatsSample::read(&stats, Duration::ZERO), &mut samples);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wake.notified() => {}
        }
        if !keep_sampling.load(Ordering::Relaxed) {
            break;
        }
        if stats.is_paused() {
            continue;
        }
        let sample = StatsSample::read(&stats, stats.time_elapsed());
        tracing::trace!(
            blue = sample.blue,
            green = sample.green,
            elapsed_ms = sample.time_elapsed.as_millis() as u64,
            "Stats sampled"
        );
        record(sample, &mut samples);
    }

    tracing::debug!(samples = samples.len(), "Sampler stopped");
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EdgeId, EngineConfig, Graph, PolicyKind, Simulation, Vertex};

    fn seeded(blue: u32, green: u32) -> Simulation {
        let mut graph = Graph::new();
        graph.add_vertex(Vertex::new(0, 1).unwrap()).unwrap();
        graph.add_vertex(Vertex::new(1, 10).unwrap()).unwrap();
        graph.add_edge(0, 1, 1.0).unwrap();
        let mut sim = Simulation::new(graph, EngineConfig::default()).unwrap();
        sim.set_starting_tokens(EdgeId(0), Color::Blue, blue).unwrap();
        sim.set_starting_tokens(EdgeId(0), Color::Green, green).unwrap();
        sim.start(PolicyKind::ImmediateReset, true).unwrap();
        sim
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_on_interval() {
        let sim = seeded(3, 2);
        let sampler = spawn_sampler(sim.stats_handle(), Duration::from_millis(500), None);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        let samples = sampler.stop().await.unwrap();

        // Initial point plus ticks at 500, 1000 and 1500 ms
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].time_elapsed, Duration::ZERO);
        assert!(samples.iter().all(|s| s.blue == 3 && s.green == 2));
        assert_eq!(samples[0].total(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_counts_and_feeds_sink() {
        let mut sim = seeded(2, 0);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sampler = spawn_sampler(sim.stats_handle(), Duration::from_millis(100), Some(tx));

        tokio::time::sleep(Duration::from_millis(150)).await;
        sim.run_until_stopped().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let samples = sampler.stop().await.unwrap();

        assert_eq!(samples.first().map(|s| s.blue), Some(2));
        assert_eq!(samples.last().map(|s| s.blue), Some(0));

        let mut streamed = Vec::new();
        while let Ok(sample) = rx.try_recv() {
            streamed.push(sample);
        }
        assert_eq!(streamed, samples);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_while_paused() {
        let mut sim = seeded(1, 0);
        sim.pause().unwrap();
        let sampler = spawn_sampler(sim.stats_handle(), Duration::from_millis(100), None);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        let samples = sampler.stop().await.unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_stops_loop() {
        let sim = seeded(1, 0);
        let sampler = spawn_sampler(sim.stats_handle(), Duration::from_millis(100), None);
        sampler.keep_sampling().store(false, Ordering::Relaxed);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(sampler.task.is_finished());
        assert_eq!(sampler.stop().await.unwrap().len(), 1);
    }
}
