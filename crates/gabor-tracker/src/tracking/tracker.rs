//! MultiObjectTracker aggregate root.
//!
//! Associates pixel-space detections with persistent track identities once
//! per tick and drives each track's lifecycle.

use serde::{Deserialize, Serialize};

use super::assignment::{greedy_assign, hungarian_assign};
use super::lifecycle::{
    AssignmentStrategy, DistanceMode, ReportPolicy, TrackLifecycle, TrackState, TrackerConfig,
};
use crate::detection::{BoundingBox, Detection};

// ---------------------------------------------------------------------------
// TrackId
// ---------------------------------------------------------------------------

/// Identifier of a track; unique for the tracker's lifetime and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u64);

impl TrackId {
    /// Raw numeric id
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Box in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
    /// Left column
    pub x_min: i32,
    /// Top row
    pub y_min: i32,
    /// Right column
    pub x_max: i32,
    /// Bottom row
    pub y_max: i32,
}

impl From<BoundingBox> for PixelBox {
    fn from(b: BoundingBox) -> Self {
        Self {
            x_min: b.x_min as i32,
            y_min: b.y_min as i32,
            x_max: b.x_max as i32,
            y_max: b.y_max as i32,
        }
    }
}

/// Reported state of one track after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    /// Track identity
    pub track_id: TrackId,
    /// Last matched box
    pub bbox: PixelBox,
    /// Lifecycle state
    pub state: TrackState,
    /// Score of the last matched detection
    pub score: f32,
    /// Consecutive matched ticks
    pub hits_in_a_row: u32,
    /// Consecutive unmatched ticks
    pub misses_in_a_row: u32,
    /// Ticks since birth
    pub age: u64,
}

/// Summary of what happened during one tracker update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    /// Tracks that matched a detection this tick.
    pub matched: Vec<TrackId>,
    /// New tracks born from unmatched detections.
    pub born: Vec<TrackId>,
    /// Tracks that became Confirmed this tick.
    pub confirmed: Vec<TrackId>,
    /// Tracks that transitioned Confirmed → Lost this tick.
    pub lost: Vec<TrackId>,
    /// Lost tracks matched again this tick.
    pub recovered: Vec<TrackId>,
    /// Tracks deleted and removed this tick.
    pub deleted: Vec<TrackId>,
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// A tracked object with its lifecycle.
#[derive(Debug, Clone)]
pub struct Track {
    /// Stable identifier
    pub id: TrackId,
    /// Last matched box (pixels)
    pub last_box: BoundingBox,
    /// Last matched score
    pub last_score: f32,
    /// Ticks since birth
    pub age: u64,
    lifecycle: TrackLifecycle,
}

impl Track {
    fn born(id: TrackId, det: &Detection, config: &TrackerConfig) -> Self {
        let mut lifecycle = TrackLifecycle::new(config);
        lifecycle.hit(); // birth detection counts as the first hit
        Self {
            id,
            last_box: det.bbox,
            last_score: det.score,
            age: 0,
            lifecycle,
        }
    }

    /// Lifecycle state
    pub fn state(&self) -> TrackState {
        self.lifecycle.state()
    }

    /// Borrow the lifecycle
    pub fn lifecycle(&self) -> &TrackLifecycle {
        &self.lifecycle
    }

    /// Snapshot for reporting
    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            track_id: self.id,
            bbox: PixelBox::from(self.last_box),
            state: self.lifecycle.state(),
            score: self.last_score,
            hits_in_a_row: self.lifecycle.hits_in_a_row(),
            misses_in_a_row: self.lifecycle.misses_in_a_row(),
            age: self.age,
        }
    }

    fn is_reported(&self, policy: ReportPolicy) -> bool {
        match (self.lifecycle.state(), policy) {
            (TrackState::Confirmed, _) => true,
            (TrackState::Lost, ReportPolicy::EverConfirmed) => self.lifecycle.ever_confirmed(),
            _ => false,
        }
    }
}

/// Distance between a track's last box and a detection box.
fn distance(mode: DistanceMode, a: &BoundingBox, b: &BoundingBox) -> f64 {
    match mode {
        DistanceMode::Center => {
            let (ax, ay) = a.center();
            let (bx, by) = b.center();
            let (dx, dy) = (f64::from(ax - bx), f64::from(ay - by));
            (dx * dx + dy * dy).sqrt()
        }
        DistanceMode::Corners => a
            .corners()
            .iter()
            .zip(b.corners())
            .map(|(p, q)| f64::from(p - q).powi(2))
            .sum::<f64>()
            .sqrt(),
    }
}

// ---------------------------------------------------------------------------
// MultiObjectTracker
// ---------------------------------------------------------------------------

/// Aggregate root managing all live tracks.
#[derive(Debug, Clone)]
pub struct MultiObjectTracker {
    tracks: Vec<Track>,
    config: TrackerConfig,
    next_id: u64,
    last_summary: UpdateSummary,
}

impl MultiObjectTracker {
    /// Create a tracker with the provided configuration.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            config,
            next_id: 1,
            last_summary: UpdateSummary::default(),
        }
    }

    /// Create a tracker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TrackerConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Main per-tick update with pixel-space detections.
    ///
    /// Algorithm:
    /// 1. Drop detections with non-positive score
    /// 2. Gate track/detection distances (strictly below the threshold)
    /// 3. Assign pairs (greedy or optimal)
    /// 4. Hit matched tracks, miss unmatched ones, age all existing tracks
    /// 5. Birth: unmatched detections → new Tentative tracks
    /// 6. Remove Deleted tracks
    ///
    /// Returns the reported tracks sorted by id.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackSnapshot> {
        let mut summary = UpdateSummary::default();

        let detections: Vec<&Detection> = detections.iter().filter(|d| d.score > 0.0).collect();
        let n_tracks = self.tracks.len();
        let n_obs = detections.len();

        // ----------------------------------------------------------------
        // Step 2: Build gated cost matrix [track_idx][det_idx]
        // ----------------------------------------------------------------
        let gate = f64::from(self.config.distance_threshold);
        let costs: Vec<Vec<f64>> = self
            .tracks
            .iter()
            .map(|track| {
                detections
                    .iter()
                    .map(|det| {
                        let d = distance(self.config.distance_mode, &track.last_box, &det.bbox);
                        if d < gate {
                            d
                        } else {
                            f64::MAX
                        }
                    })
                    .collect()
            })
            .collect();

        // ----------------------------------------------------------------
        // Step 3: Assignment
        // ----------------------------------------------------------------
        let assignments = match self.config.assignment {
            AssignmentStrategy::Greedy => greedy_assign(&costs, n_tracks, n_obs),
            AssignmentStrategy::Optimal => hungarian_assign(&costs, n_tracks, n_obs),
        };

        // ----------------------------------------------------------------
        // Step 4: Lifecycle transitions for existing tracks
        // ----------------------------------------------------------------
        let mut obs_assigned = vec![false; n_obs];
        for (track, assigned) in self.tracks.iter_mut().zip(&assignments) {
            track.age += 1;
            let before = track.lifecycle.state();

            match assigned {
                Some(oi) => {
                    obs_assigned[*oi] = true;
                    let det = detections[*oi];
                    track.last_box = det.bbox;
                    track.last_score = det.score;
                    track.lifecycle.hit();
                    summary.matched.push(track.id);
                }
                None => track.lifecycle.miss(),
            }

            let after = track.lifecycle.state();
            match (before, after) {
                (TrackState::Tentative, TrackState::Confirmed) => {
                    summary.confirmed.push(track.id);
                    tracing::debug!(track_id = %track.id, "Track confirmed");
                }
                (TrackState::Confirmed, TrackState::Lost) => {
                    summary.lost.push(track.id);
                    tracing::debug!(track_id = %track.id, "Track transitioned to Lost");
                }
                (TrackState::Lost, TrackState::Confirmed) => {
                    summary.recovered.push(track.id);
                    tracing::debug!(track_id = %track.id, "Lost track recovered");
                }
                (_, TrackState::Deleted) if before != TrackState::Deleted => {
                    summary.deleted.push(track.id);
                    tracing::debug!(track_id = %track.id, from = %before, "Track deleted");
                }
                _ => {}
            }
        }

        // ----------------------------------------------------------------
        // Step 5: Birth of Tentative tracks from unmatched detections
        // ----------------------------------------------------------------
        for (oi, det) in detections.iter().enumerate() {
            if obs_assigned[oi] {
                continue;
            }
            let id = TrackId(self.next_id);
            self.next_id += 1;
            let track = Track::born(id, det, &self.config);
            if track.state() == TrackState::Confirmed {
                summary.confirmed.push(id);
            }
            summary.born.push(id);
            self.tracks.push(track);
        }

        // ----------------------------------------------------------------
        // Step 6: Remove Deleted tracks
        // ----------------------------------------------------------------
        self.tracks.retain(|t| !t.lifecycle.is_terminal());

        tracing::trace!(
            detections = n_obs,
            tracks = self.tracks.len(),
            matched = summary.matched.len(),
            born = summary.born.len(),
            deleted = summary.deleted.len(),
            "Tracker updated"
        );

        self.last_summary = summary;
        self.reported_tracks()
    }

    /// Tracks passing the report policy, sorted by id.
    pub fn reported_tracks(&self) -> Vec<TrackSnapshot> {
        self.tracks
            .iter()
            .filter(|t| t.is_reported(self.config.report_policy))
            .map(Track::snapshot)
            .collect()
    }

    /// Summary of the most recent update.
    pub fn last_summary(&self) -> &UpdateSummary {
        &self.last_summary
    }

    /// Borrow the full track list (all live states), sorted by id.
    pub fn all_tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Look up a specific track by ID.
    pub fn get_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Total number of live tracks (all states).
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Drop every track; ids keep increasing.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.last_summary = UpdateSummary::default();
    }
}
