//! Multi-object tracking of pixel-space detections.
//!
//! Implements three collaborating components:
//!
//! - **[`TrackLifecycle`]**: state machine (Tentative→Confirmed→Lost→Deleted)
//! - **[`greedy_assign`] / [`hungarian_assign`]**: gated data association
//! - **[`MultiObjectTracker`]**: aggregate root orchestrating both
//!
//! # Example
//!
//! ```rust
//! use gabor_tracker::detection::{BoundingBox, Detection};
//! use gabor_tracker::tracking::MultiObjectTracker;
//!
//! let mut tracker = MultiObjectTracker::with_defaults();
//! let det = Detection::new(BoundingBox::new(10.0, 10.0, 20.0, 20.0), 9.0);
//! for _ in 0..3 {
//!     tracker.update(&[det]);
//! }
//! assert_eq!(tracker.reported_tracks().len(), 1);
//! ```

pub mod assignment;
pub mod lifecycle;
pub mod tracker;

pub use assignment::{greedy_assign, hungarian_assign};
pub use lifecycle::{
    AssignmentStrategy, DistanceMode, ReportPolicy, TrackLifecycle, TrackState, TrackerConfig,
};
pub use tracker::{
    MultiObjectTracker, PixelBox, Track, TrackId, TrackSnapshot, UpdateSummary,
};
