//! Track lifecycle state machine.
//!
//! Manages the lifecycle of a tracked object:
//! Tentative → Confirmed ⇄ Lost → Deleted

use serde::{Deserialize, Serialize};

/// Position used when measuring track/detection distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMode {
    /// Euclidean distance between box centres
    #[default]
    Center,
    /// Euclidean norm over both corners as one 4-vector
    Corners,
}

/// Algorithm used to pair tracks with detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssignmentStrategy {
    /// Repeatedly take the closest remaining pair
    #[default]
    Greedy,
    /// Minimum total distance (Hungarian)
    Optimal,
}

/// Which tracks appear in the per-tick output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReportPolicy {
    /// Confirmed tracks and lost tracks that were once confirmed
    #[default]
    EverConfirmed,
    /// Confirmed tracks only
    ConfirmedOnly,
}

/// Configuration for [`MultiObjectTracker`](super::MultiObjectTracker) behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Pairs at or beyond this distance (pixels) never match (default: 40)
    pub distance_threshold: f32,
    /// Position representation for distances (default: Center)
    pub distance_mode: DistanceMode,
    /// Assignment algorithm (default: Greedy)
    pub assignment: AssignmentStrategy,
    /// Consecutive misses a lost track survives (default: 30)
    pub hit_counter_max: u32,
    /// Consecutive hits to promote Tentative → Confirmed (default: 3)
    pub initialization_delay: u32,
    /// Consecutive misses to transition Confirmed → Lost (default: 1)
    pub max_confirmed_misses: u32,
    /// Output filter (default: EverConfirmed)
    pub report_policy: ReportPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 40.0,
            distance_mode: DistanceMode::Center,
            assignment: AssignmentStrategy::Greedy,
            hit_counter_max: 30,
            initialization_delay: 3,
            max_confirmed_misses: 1,
            report_policy: ReportPolicy::EverConfirmed,
        }
    }
}

/// Current lifecycle state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackState {
    /// Newly born; awaiting confirmation hits.
    Tentative,
    /// Confirmed and receiving regular detections.
    Confirmed,
    /// Confirmed earlier but currently unmatched.
    Lost,
    /// Removed from the tracker. Cannot recover.
    Deleted,
}

impl std::fmt::Display for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackState::Tentative => "tentative",
            TrackState::Confirmed => "confirmed",
            TrackState::Lost => "lost",
            TrackState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Controls lifecycle transitions for a single track.
#[derive(Debug, Clone)]
pub struct TrackLifecycle {
    state: TrackState,
    initialization_delay: u32,
    max_confirmed_misses: u32,
    hit_counter_max: u32,
    hits_in_a_row: u32,
    misses_in_a_row: u32,
    ever_confirmed: bool,
}

impl TrackLifecycle {
    /// Create a new lifecycle in Tentative with no hits.
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            state: TrackState::Tentative,
            initialization_delay: config.initialization_delay,
            max_confirmed_misses: config.max_confirmed_misses,
            hit_counter_max: config.hit_counter_max,
            hits_in_a_row: 0,
            misses_in_a_row: 0,
            ever_confirmed: false,
        }
    }

    /// Register a matched detection this tick.
    ///
    /// - Tentative: increment hits; if hits >= initialization_delay → Confirmed
    /// - Confirmed: reset misses
    /// - Lost: transition back to Confirmed
    pub fn hit(&mut self) {
        if self.state == TrackState::Deleted {
            return;
        }
        self.hits_in_a_row = self.hits_in_a_row.saturating_add(1);
        self.misses_in_a_row = 0;

        match self.state {
            TrackState::Tentative => {
                if self.hits_in_a_row >= self.initialization_delay {
                    self.state = TrackState::Confirmed;
                    self.ever_confirmed = true;
                }
            }
            TrackState::Lost => {
                self.state = TrackState::Confirmed;
            }
            TrackState::Confirmed | TrackState::Deleted => {}
        }
    }

    /// Register a tick with no matching detection.
    ///
    /// - Tentative: → Deleted immediately (not enough evidence)
    /// - Confirmed: if misses >= max_confirmed_misses → Lost
    /// - Lost: if misses > hit_counter_max → Deleted
    pub fn miss(&mut self) {
        if self.state == TrackState::Deleted {
            return;
        }
        self.misses_in_a_row = self.misses_in_a_row.saturating_add(1);
        self.hits_in_a_row = 0;

        match self.state {
            TrackState::Tentative => {
                self.state = TrackState::Deleted;
            }
            TrackState::Confirmed => {
                if self.misses_in_a_row >= self.max_confirmed_misses {
                    self.state = TrackState::Lost;
                }
            }
            TrackState::Lost | TrackState::Deleted => {}
        }

        if self.state == TrackState::Lost && self.misses_in_a_row > self.hit_counter_max {
            self.state = TrackState::Deleted;
        }
    }

    /// Get the current state.
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Consecutive matched ticks (birth included)
    pub fn hits_in_a_row(&self) -> u32 {
        self.hits_in_a_row
    }

    /// Consecutive unmatched ticks
    pub fn misses_in_a_row(&self) -> u32 {
        self.misses_in_a_row
    }

    /// True once the track has reached Confirmed.
    pub fn ever_confirmed(&self) -> bool {
        self.ever_confirmed
    }

    /// True if the track takes part in matching.
    pub fn is_alive(&self) -> bool {
        self.state != TrackState::Deleted
    }

    /// True if track is in Lost state.
    pub fn is_lost(&self) -> bool {
        self.state == TrackState::Lost
    }

    /// True if track is Deleted.
    pub fn is_terminal(&self) -> bool {
        self.state == TrackState::Deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn born_lifecycle() -> TrackLifecycle {
        let mut lc = TrackLifecycle::new(&TrackerConfig::default());
        lc.hit(); // birth
        lc
    }

    #[test]
    fn test_tentative_confirmation() {
        // Default config: initialization_delay = 3, birth counts as one hit
        let mut lc = born_lifecycle();
        assert_eq!(lc.state(), TrackState::Tentative);
        assert_eq!(lc.hits_in_a_row(), 1);

        lc.hit();
        assert_eq!(lc.state(), TrackState::Tentative);

        lc.hit();
        assert_eq!(lc.state(), TrackState::Confirmed);
        assert_eq!(lc.hits_in_a_row(), 3);
        assert!(lc.ever_confirmed());
    }

    #[test]
    fn test_tentative_miss_deletes() {
        let mut lc = born_lifecycle();
        lc.hit();
        lc.miss();
        assert_eq!(lc.state(), TrackState::Deleted);
        assert!(lc.is_terminal());
        assert!(!lc.ever_confirmed());
    }

    #[test]
    fn test_confirmed_to_lost_and_back() {
        let mut lc = born_lifecycle();
        lc.hit();
        lc.hit();
        lc.miss();
        // default max_confirmed_misses = 1
        assert!(lc.is_lost());
        assert_eq!(lc.hits_in_a_row(), 0);

        lc.hit();
        assert_eq!(lc.state(), TrackState::Confirmed);
        assert_eq!(lc.misses_in_a_row(), 0);
        assert_eq!(lc.hits_in_a_row(), 1);
    }

    #[test]
    fn test_lost_deleted_after_horizon() {
        let mut lc = born_lifecycle();
        lc.hit();
        lc.hit();
        for _ in 0..30 {
            lc.miss();
            assert!(lc.is_lost());
        }
        lc.miss();
        assert_eq!(lc.state(), TrackState::Deleted);

        // terminal: nothing revives it
        lc.hit();
        assert_eq!(lc.state(), TrackState::Deleted);
    }

    #[test]
    fn test_confirmed_tolerates_configured_misses() {
        let config = TrackerConfig {
            max_confirmed_misses: 3,
            initialization_delay: 1,
            ..TrackerConfig::default()
        };
        let mut lc = TrackLifecycle::new(&config);
        lc.hit();
        assert_eq!(lc.state(), TrackState::Confirmed);
        lc.miss();
        lc.miss();
        assert_eq!(lc.state(), TrackState::Confirmed);
        lc.miss();
        assert!(lc.is_lost());
    }

    #[test]
    fn test_loss_and_deletion_on_same_miss() {
        let config = TrackerConfig {
            hit_counter_max: 2,
            max_confirmed_misses: 3,
            initialization_delay: 1,
            ..TrackerConfig::default()
        };
        let mut lc = TrackLifecycle::new(&config);
        lc.hit();
        lc.miss();
        lc.miss();
        lc.miss();
        assert_eq!(lc.state(), TrackState::Deleted);
    }
}
