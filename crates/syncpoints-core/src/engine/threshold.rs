//! Per-vertex threshold counters
//!
//! Each vertex carries one live counter per colour channel. A token arriving
//! decrements the counter of its colour; a channel whose counter drops below
//! 1 makes the vertex fire.

use serde::{Deserialize, Serialize};

/// Token colour channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    #[default]
    Blue,
    Green,
}

impl Color {
    /// Both channels in their fixed processing order
    pub const ALL: [Color; 2] = [Color::Blue, Color::Green];

    /// Array index of this channel
    pub fn index(self) -> usize {
        match self {
            Color::Blue => 0,
            Color::Green => 1,
        }
    }

    /// The other channel
    pub fn other(self) -> Color {
        match self {
            Color::Blue => Color::Green,
            Color::Green => Color::Blue,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Blue => write!(f, "blue"),
            Color::Green => write!(f, "green"),
        }
    }
}

/// Live counters of a single vertex
///
/// Counters may go negative. That is flagged per channel as an anomaly and
/// never treated as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdState {
    init_sync: i64,
    sync: [i64; 2],
    negative: [bool; 2],
}

impl ThresholdState {
    /// Create a state resting at `init_sync` on both channels
    pub fn new(init_sync: i64) -> Self {
        Self {
            init_sync,
            sync: [init_sync; 2],
            negative: [false; 2],
        }
    }

    /// The firing threshold and reset target
    pub fn init_sync(&self) -> i64 {
        self.init_sync
    }

    /// Current counter value of a channel
    pub fn sync(&self, color: Color) -> i64 {
        self.sync[color.index()]
    }

    /// Token arrived: decrement the channel
    ///
    /// Returns `true` when the counter went negative on this call.
    pub fn decrement(&mut self, color: Color) -> bool {
        let slot = &mut self.sync[color.index()];
        *slot -= 1;
        if *slot < 0 {
            self.negative[color.index()] = true;
            true
        } else {
            false
        }
    }

    /// Increment the channel by one during redistribution
    pub fn increment(&mut self, color: Color) {
        self.sync[color.index()] += 1;
    }

    /// Shift the channel by `delta`
    pub fn bump(&mut self, color: Color, delta: i64) {
        self.sync[color.index()] += delta;
    }

    /// Set the channel to `value`
    pub fn reset(&mut self, color: Color, value: i64) {
        self.sync[color.index()] = value;
    }

    /// Reset both channels to `init_sync`
    pub fn reset_all(&mut self) {
        self.sync = [self.init_sync; 2];
    }

    /// Fire condition for one channel
    pub fn is_below_threshold(&self, color: Color) -> bool {
        self.sync(color) < 1
    }

    /// Fire condition for the vertex: either channel below threshold
    pub fn any_below_threshold(&self) -> bool {
        Color::ALL.iter().any(|c| self.is_below_threshold(*c))
    }

    /// Channels currently below threshold, in channel order
    pub fn firing_colors(&self) -> Vec<Color> {
        Color::ALL
            .into_iter()
            .filter(|c| self.is_below_threshold(*c))
            .collect()
    }

    /// Both channels sit at `init_sync`
    pub fn is_at_rest(&self) -> bool {
        self.sync.iter().all(|s| *s == self.init_sync)
    }

    /// Whether the channel has gone negative since the last clear
    pub fn is_negative(&self, color: Color) -> bool {
        self.negative[color.index()]
    }

    /// Forget recorded anomalies
    pub fn clear_anomalies(&mut self) {
        self.negative = [false; 2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_at_rest() {
        let state = ThresholdState::new(3);
        assert_eq!(state.sync(Color::Blue), 3);
        assert_eq!(state.sync(Color::Green), 3);
        assert!(state.is_at_rest());
        assert!(!state.any_below_threshold());
    }

    #[test]
    fn test_decrement_to_threshold() {
        let mut state = ThresholdState::new(2);
        assert!(!state.decrement(Color::Blue));
        assert!(!state.is_below_threshold(Color::Blue));
        assert!(!state.decrement(Color::Blue));
        assert!(state.is_below_threshold(Color::Blue));
        assert!(!state.is_below_threshold(Color::Green));
        assert_eq!(state.firing_colors(), vec![Color::Blue]);
    }

    #[test]
    fn test_negative_is_recorded_per_channel() {
        let mut state = ThresholdState::new(1);
        state.decrement(Color::Green);
        assert!(state.decrement(Color::Green));
        assert_eq!(state.sync(Color::Green), -1);
        assert!(state.is_negative(Color::Green));
        assert!(!state.is_negative(Color::Blue));

        // Flag survives a reset until explicitly cleared
        state.reset_all();
        assert!(state.is_negative(Color::Green));
        state.clear_anomalies();
        assert!(!state.is_negative(Color::Green));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut state = ThresholdState::new(4);
        state.decrement(Color::Blue);
        state.reset(Color::Blue, 4);
        state.reset(Color::Blue, 4);
        assert_eq!(state.sync(Color::Blue), 4);
        assert!(state.is_at_rest());
    }

    #[test]
    fn test_either_channel_fires() {
        let mut state = ThresholdState::new(1);
        state.decrement(Color::Green);
        assert!(state.any_below_threshold());
        assert_eq!(state.firing_colors(), vec![Color::Green]);
        state.decrement(Color::Blue);
        assert_eq!(state.firing_colors(), vec![Color::Blue, Color::Green]);
    }

    #[test]
    fn test_bump_and_increment() {
        let mut state = ThresholdState::new(2);
        state.decrement(Color::Blue);
        state.decrement(Color::Blue);
        state.bump(Color::Blue, 2);
        state.increment(Color::Blue);
        assert_eq!(state.sync(Color::Blue), 3);
        assert!(!state.is_at_rest());
    }

    #[test]
    fn test_color_helpers() {
        assert_eq!(Color::Blue.other(), Color::Green);
        assert_eq!(Color::Green.index(), 1);
        assert_eq!(Color::default(), Color::Blue);
        assert_eq!(Color::Green.to_string(), "green");
    }
}
