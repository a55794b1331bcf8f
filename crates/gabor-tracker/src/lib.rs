//! # Gabor Tracker
//!
//! Multi-object tracking for event-camera streams, built on a bank of
//! orientation-selective spatio-temporal (Gabor) filters.
//!
//! ## Features
//!
//! - **Candidate Extraction**: Threshold + DBSCAN clustering of activation maps
//! - **Multi-Channel Fusion**: Per-channel extraction on a worker pool merged by weighted box fusion
//! - **Tracking**: Persistent identities with a Tentative/Confirmed/Lost/Deleted lifecycle
//! - **Instrumentation**: Running-mean timings per pipeline stage
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        GaborTracker                        │
//! ├────────────────────────────────────────────────────────────┤
//! │  events ─▶ FrameWindow ─▶ ResponseEngine ─▶ smoothing      │
//! │                                   │                        │
//! │                         ┌─────────▼──────────┐             │
//! │                         │ CandidateExtractor │             │
//! │                         │  (or fusion mode)  │             │
//! │                         └─────────┬──────────┘             │
//! │                                   ▼                        │
//! │                          MultiObjectTracker ─▶ tracks      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use gabor_tracker::{GaborTracker, GaborTrackerConfig};
//! use gabor_tracker_signal::{Event, FilterBank, Polarity};
//! use ndarray::Array3;
//!
//! # fn main() -> gabor_tracker::Result<()> {
//! let config = GaborTrackerConfig::builder()
//!     .frame_window_depth(9)
//!     .activation_threshold(0.5)
//!     .build()?;
//!
//! let mut kernel = Array3::<f32>::zeros((7, 3, 3));
//! kernel[[3, 1, 1]] = 1.0;
//! let bank = FilterBank::from_raw(vec![kernel], 31.0)?;
//!
//! let mut tracker = GaborTracker::new(config, bank, 32, 32)?;
//! let output = tracker.process_tick(&[Event::new(0, 4, 4, Polarity::On)])?;
//! assert_eq!(output.tick, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod detection;
pub mod pipeline;
pub mod tracking;

pub use config::{ConfigError, GaborTrackerConfig, GaborTrackerConfigBuilder};
pub use detection::{
    BoundingBox, CandidateExtractor, CandidateRegion, Detection, ExtractionTiming,
    FusionScoreMode, MultiChannelExtractor, WeightedBoxFusion,
};
pub use pipeline::{GaborTracker, StageTimings, TickOutput, TimingReport};
pub use tracking::{
    AssignmentStrategy, DistanceMode, MultiObjectTracker, PixelBox, ReportPolicy, Track,
    TrackId, TrackLifecycle, TrackSnapshot, TrackState, TrackerConfig, UpdateSummary,
};

pub use gabor_tracker_signal::SignalError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Unified error type for the tracking pipeline
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Configuration rejected before any processing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Signal processing error
    #[error("Signal processing error: {0}")]
    Signal(#[from] SignalError),

    /// The frame window cannot serve the requested temporal window; the tick
    /// was skipped and no state changed
    #[error("Frame window underflow: {0}")]
    BufferUnderflow(SignalError),

    /// An event batch went backwards in time
    #[error("Out-of-order event: timestamp {found} precedes {previous}")]
    OutOfOrder {
        /// Latest timestamp seen so far
        previous: i64,
        /// Offending timestamp
        found: i64,
    },

    /// Tick aborted through the cancellation flag
    #[error("Tick cancelled")]
    Cancelled,

    /// Worker pool could not be created
    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl TrackerError {
    /// Whether the session can keep processing ticks after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrackerError::BufferUnderflow(_)
                | TrackerError::OutOfOrder { .. }
                | TrackerError::Cancelled
        )
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        GaborTracker, GaborTrackerConfig, Result, TrackerError,
        // Detection
        BoundingBox, CandidateExtractor, Detection, MultiChannelExtractor,
        // Tracking
        MultiObjectTracker, TrackSnapshot, TrackState,
        // Pipeline
        TickOutput, TimingReport,
    };
    pub use gabor_tracker_signal::prelude::*;
}
