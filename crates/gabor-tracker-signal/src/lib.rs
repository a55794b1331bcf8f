//! Gabor Tracker Signal Processing Library
//!
//! This crate turns a raw event-camera stream into the per-pixel activation
//! maps consumed by the detection and tracking stages of `gabor-tracker`.
//!
//! # Features
//!
//! - **Event Accumulation**: Polarity events summed into clamped [`EventFrame`]s
//! - **Time Slicing**: Partitioning of a sorted event stream into fixed-`dt` ticks
//! - **Frame Window**: Fixed-depth sliding window of frames with strided views
//! - **Filter Bank**: Spatio-temporal kernels, normalized and flipped once
//! - **Response Engine**: Same-size 3-D convolution with optional tile suppression
//! - **Smoothing**: Separable Gaussian blur and activation collapse
//! - **Timing**: Running-mean stage instrumentation
//!
//! # Example
//!
//! ```rust
//! use gabor_tracker_signal::{Event, EventFrame, FrameWindow, Polarity};
//!
//! let events = vec![
//!     Event::new(0, 3, 2, Polarity::On),
//!     Event::new(5, 3, 2, Polarity::On),
//! ];
//! let (frame, dropped) = EventFrame::accumulate(&events, 8, 8);
//! assert_eq!(dropped, 0);
//!
//! let mut window = FrameWindow::new(55, 8, 8).unwrap();
//! window.push(frame).unwrap();
//! assert_eq!(window.len(), 55);
//! ```

pub mod event;
pub mod filter_bank;
pub mod frame_window;
pub mod response;
pub mod slicer;
pub mod smoothing;
pub mod timing;

pub use event::{Event, EventFrame, Polarity};
pub use filter_bank::{FilterBank, DEFAULT_DYNAMIC_RANGE};
pub use frame_window::{FrameWindow, TemporalWindow};
pub use response::{ActivationMap, ResponseConfig, ResponseEngine, ResponseMaps};
pub use slicer::TimeSlices;
pub use smoothing::GaussianSmoother;
pub use timing::MovingAverage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for signal processing operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Unified error type for signal processing operations
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Requested temporal window does not fit inside the frame window
    #[error(
        "Window out of bounds: stride {stride}, length {length}, offset {center_offset} \
         exceeds depth {depth}"
    )]
    WindowOutOfBounds {
        /// Step between selected frames
        stride: usize,
        /// Number of frames requested
        length: usize,
        /// Offset of the first frame from the window centre
        center_offset: isize,
        /// Capacity of the frame window
        depth: usize,
    },

    /// Array shapes that must agree do not
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },

    /// Filter bank could not be constructed
    #[error("Invalid filter bank: {0}")]
    InvalidFilterBank(String),

    /// Input has no usable dynamic range (e.g. a constant map)
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Event carries an invalid field value
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Statistic requested before any sample was recorded
    #[error("No samples recorded")]
    NoSamples,
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::event::{Event, EventFrame, Polarity};
    pub use crate::filter_bank::FilterBank;
    pub use crate::frame_window::{FrameWindow, TemporalWindow};
    pub use crate::response::{ActivationMap, ResponseConfig, ResponseEngine, ResponseMaps};
    pub use crate::smoothing::GaussianSmoother;
    pub use crate::timing::MovingAverage;
    pub use crate::{Result, SignalError};
}
