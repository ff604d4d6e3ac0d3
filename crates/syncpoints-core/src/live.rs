//! Live driver
//!
//! Runs a [`Simulation`] on a tokio task, pacing virtual arrival times
//! against the wall clock so a run can be watched, paused and stopped
//! while it happens. The task owns the simulation; callers talk to it
//! through a [`RunHandle`] over an mpsc channel.
//!
//! Virtual time maps to wall time as
//! `wall = virtual * time_scale / exp(SPEED_EXPONENT * speed)`. Pausing
//! catches the virtual clock up with the wall clock first, so every token
//! keeps its remaining travel time across the pause.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::engine::{
    EngineError, PolicyKind, Simulation, SimulationState, StatisticsSnapshot, StatsHandle,
    StopReason,
};

/// Growth rate of the speed control; +5 steps is roughly 5x faster
pub const SPEED_EXPONENT: f64 = 0.321888;

/// Wall-clock acceleration for a speed setting
pub fn speed_ratio(speed: f64) -> f64 {
    (SPEED_EXPONENT * speed).exp()
}

/// Pacing of a live run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveOptions {
    /// Wall-clock seconds per unit of virtual time at speed 0
    pub time_scale: f64,
    /// Speed exponent; 0 is real time, negative is slower
    pub speed: f64,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            speed: 0.0,
        }
    }
}

impl LiveOptions {
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Wall-clock seconds per unit of virtual time
    pub fn wall_per_unit(&self) -> f64 {
        self.time_scale / speed_ratio(self.speed)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(EngineError::config_error(format!(
                "time_scale must be positive, got {}",
                self.time_scale
            )));
        }
        if !self.wall_per_unit().is_normal() {
            return Err(EngineError::config_error(format!(
                "speed {} is out of range",
                self.speed
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause,
    Resume,
    Stop,
}

/// Result of a finished live run
#[derive(Debug)]
pub struct RunOutcome {
    pub reason: StopReason,
    pub snapshot: StatisticsSnapshot,
    /// The simulation, handed back so it can be restarted
    pub simulation: Simulation,
}

/// Control surface of a live run
///
/// Dropping the handle, together with every [`RunControls`] taken from it,
/// stops the run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: String,
    commands: mpsc::UnboundedSender<Command>,
    stats: StatsHandle,
    task: JoinHandle<Result<RunOutcome, EngineError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Lock-free view of the run's running totals
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Cloneable commands for use while the handle is being joined
    pub fn controls(&self) -> RunControls {
        RunControls {
            commands: self.commands.clone(),
        }
    }

    /// Freeze the run; ignored unless running
    pub fn pause(&self) -> Result<(), EngineError> {
        send(&self.commands, Command::Pause, "pause")
    }

    /// Continue a paused run; ignored unless paused
    pub fn resume(&self) -> Result<(), EngineError> {
        send(&self.commands, Command::Resume, "resume")
    }

    /// Stop the run
    pub fn stop(&self) -> Result<(), EngineError> {
        send(&self.commands, Command::Stop, "stop")
    }

    /// Whether the driver task has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to stop
    pub async fn join(self) -> Result<RunOutcome, EngineError> {
        let Self { commands, task, .. } = self;
        let result = task
            .await
            .map_err(|e| EngineError::Driver(e.to_string()))?;
        drop(commands);
        result
    }
}

/// Sender side of a [`RunHandle`]
#[derive(Debug, Clone)]
pub struct RunControls {
    commands: mpsc::UnboundedSender<Command>,
}

impl RunControls {
    pub fn pause(&self) -> Result<(), EngineError> {
        send(&self.commands, Command::Pause, "pause")
    }

    pub fn resume(&self) -> Result<(), EngineError> {
        send(&self.commands, Command::Resume, "resume")
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        send(&self.commands, Command::Stop, "stop")
    }
}

fn send(
    commands: &mpsc::UnboundedSender<Command>,
    command: Command,
    operation: &'static str,
) -> Result<(), EngineError> {
    commands
        .send(command)
        .map_err(|_| EngineError::invalid_state(operation, "finished"))
}

/// Start `simulation` and drive it on a new tokio task
///
/// Seeding happens before this returns, so a run that drains or exceeds
/// capacity on start is already stopped when the handle is joined. Must be
/// called within a tokio runtime.
pub fn spawn_live(
    mut simulation: Simulation,
    policy: PolicyKind,
    disable_visual_effects: bool,
    options: LiveOptions,
) -> Result<RunHandle, EngineError> {
    options.validate()?;
    simulation.start(policy, disable_visual_effects)?;

    let run_id = simulation.run_id().to_string();
    let stats = simulation.stats_handle();
    let (commands, receiver) = mpsc::unbounded_channel();

    tracing::info!(
        run_id = %run_id,
        speed = options.speed,
        wall_per_unit = options.wall_per_unit(),
        "Live run started"
    );
    let task = tokio::spawn(drive(simulation, receiver, options));

    Ok(RunHandle {
        run_id,
        commands,
        stats,
        task,
    })
}

async fn drive(
    mut sim: Simulation,
    mut commands: mpsc::UnboundedReceiver<Command>,
    options: LiveOptions,
) -> Result<RunOutcome, EngineError> {
    let wall_per_unit = options.wall_per_unit();
    // Wall instant at which the virtual clock read `anchor.1`
    let mut anchor = (Instant::now(), sim.clock());

    loop {
        match sim.state() {
            SimulationState::Running => {
                let next = sim.next_arrival_time();
                let deadline = next
                    .map(|at| anchor.0 + wall_delay(at - anchor.1, wall_per_unit))
                    .unwrap_or_else(Instant::now);

                tokio::select! {
                    command = commands.recv() => match command {
                        Some(command) => apply(&mut sim, command, &mut anchor, wall_per_unit)?,
                        None => sim.stop()?,
                    },
                    _ = tokio::time::sleep_until(deadline), if next.is_some() => {
                        if let Some(at) = next {
                            sim.advance_to(at)?;
                        }
                    }
                }
            }
            SimulationState::Paused => match commands.recv().await {
                Some(command) => apply(&mut sim, command, &mut anchor, wall_per_unit)?,
                None => sim.stop()?,
            },
            SimulationState::Stopped(_) => break,
            other => return Err(EngineError::invalid_state("drive", other)),
        }
    }

    let reason = match sim.state() {
        SimulationState::Stopped(reason) => reason,
        other => return Err(EngineError::invalid_state("join", other)),
    };
    tracing::info!(run_id = %sim.run_id(), reason = ?reason, "Live run finished");

    let snapshot = sim.statistics().snapshot();
    Ok(RunOutcome {
        reason,
        snapshot,
        simulation: sim,
    })
}

fn apply(
    sim: &mut Simulation,
    command: Command,
    anchor: &mut (Instant, f64),
    wall_per_unit: f64,
) -> Result<(), EngineError> {
    tracing::debug!(command = ?command, state = %sim.state(), "Live command");
    match (command, sim.state()) {
        (Command::Pause, SimulationState::Running) => {
            let elapsed = anchor.0.elapsed().as_secs_f64() / wall_per_unit;
            sim.advance_to(anchor.1 + elapsed)?;
            if sim.state() == SimulationState::Running {
                sim.pause()?;
            }
        }
        (Command::Resume, SimulationState::Paused) => {
            sim.resume()?;
            *anchor = (Instant::now(), sim.clock());
        }
        (Command::Stop, state) if state.is_active() => sim.stop()?,
        _ => {}
    }
    Ok(())
}

fn wall_delay(virtual_delta: f64, wall_per_unit: f64) -> Duration {
    let secs = virtual_delta * wall_per_unit;
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}
