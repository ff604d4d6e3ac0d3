//! Event and callback surface of a run
//!
//! Collaborators implement [`SimulationObserver`] to follow a run as it
//! happens. Every method has a no-op default, so an observer only
//! overrides what it cares about. Callbacks run synchronously on the
//! scheduler's thread in between cascade steps and must not block.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::graph::{EdgeId, VertexId};
use super::threshold::Color;

/// Why a run reached `Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `stop()` was called
    UserRequested,
    /// In-flight tokens exceeded the configured ceiling
    CapacityExceeded,
    /// No token in flight and no cascade owed
    Drained,
}

impl StopReason {
    /// Whether the saturation guard ended the run
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, StopReason::CapacityExceeded)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::UserRequested => write!(f, "stopped by user"),
            StopReason::CapacityExceeded => write!(
                f,
                "too many tokens in flight; disable visual effects to raise the limit"
            ),
            StopReason::Drained => write!(f, "drained"),
        }
    }
}

/// Receives notifications from a running simulation
pub trait SimulationObserver: Send {
    /// A token reached `vertex`
    fn on_token_arrived(&mut self, _vertex: VertexId, _color: Color) {}

    /// `vertex` fired on the `colors` channels and placed tokens on `emitted`
    fn on_vertex_fired(&mut self, _vertex: VertexId, _colors: &[Color], _emitted: &[EdgeId]) {}

    /// A counter dropped below zero
    fn on_negative_sync(&mut self, _vertex: VertexId, _color: Color, _sync: i64) {}

    /// The run ended
    fn on_simulation_stopped(&mut self, _reason: StopReason) {}
}

/// Owned record of an observer notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationEvent {
    TokenArrived {
        vertex: VertexId,
        color: Color,
    },
    VertexFired {
        vertex: VertexId,
        colors: Vec<Color>,
        emitted: Vec<EdgeId>,
    },
    NegativeSync {
        vertex: VertexId,
        color: Color,
        sync: i64,
    },
    Stopped {
        reason: StopReason,
    },
}

/// Observer that keeps every notification in memory
///
/// Clones share the same buffer, so one clone can be handed to the
/// simulation while another is read afterwards.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SimulationEvent>>>,
}

impl EventRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events in notification order
    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Vertices that fired, in firing order
    pub fn fired_vertices(&self) -> Vec<VertexId> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SimulationEvent::VertexFired { vertex, .. } => Some(vertex),
                _ => None,
            })
            .collect()
    }

    /// Reason of the last stop notification
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.events().into_iter().rev().find_map(|event| match event {
            SimulationEvent::Stopped { reason } => Some(reason),
            _ => None,
        })
    }

    fn push(&self, event: SimulationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SimulationObserver for EventRecorder {
    fn on_token_arrived(&mut self, vertex: VertexId, color: Color) {
        self.push(SimulationEvent::TokenArrived { vertex, color });
    }

    fn on_vertex_fired(&mut self, vertex: VertexId, colors: &[Color], emitted: &[EdgeId]) {
        self.push(SimulationEvent::VertexFired {
            vertex,
            colors: colors.to_vec(),
            emitted: emitted.to_vec(),
        });
    }

    fn on_negative_sync(&mut self, vertex: VertexId, color: Color, sync: i64) {
        self.push(SimulationEvent::NegativeSync {
            vertex,
            color,
            sync,
        });
    }

    fn on_simulation_stopped(&mut self, reason: StopReason) {
        self.push(SimulationEvent::Stopped { reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(EventRecorder: SimulationObserver, Send, Sync, Clone);

    #[test]
    fn test_recorder_shares_buffer() {
        let recorder = EventRecorder::new();
        let mut observer = recorder.clone();

        observer.on_token_arrived(VertexId(1), Color::Blue);
        observer.on_vertex_fired(VertexId(1), &[Color::Blue], &[EdgeId(0), EdgeId(2)]);
        observer.on_simulation_stopped(StopReason::Drained);

        let events = recorder.events();
        assert_eq!(events.len(), 3);
        assert_eq!(recorder.fired_vertices(), vec![VertexId(1)]);
        assert_eq!(recorder.stop_reason(), Some(StopReason::Drained));
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Silent;
        impl SimulationObserver for Silent {}

        let mut silent = Silent;
        silent.on_negative_sync(VertexId(0), Color::Green, -1);
        silent.on_simulation_stopped(StopReason::UserRequested);
    }

    #[test]
    fn test_stop_reason_display() {
        assert!(StopReason::CapacityExceeded
            .to_string()
            .contains("disable visual effects"));
        assert!(StopReason::CapacityExceeded.is_capacity_exceeded());
        assert!(!StopReason::Drained.is_capacity_exceeded());
    }

    #[test]
    fn test_event_serialization() {
        let event = SimulationEvent::Stopped {
            reason: StopReason::UserRequested,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stopped");
        assert_eq!(json["reason"], "user_requested");
    }
}
