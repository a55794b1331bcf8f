//! Tracking session: one frame window, one tracker, one tick at a time.
//!
//! [`GaborTracker`] owns every piece of per-stream state. Each tick the caller
//! hands over one batch of events (or a ready-made frame); the session pushes
//! it into the frame window, computes filter responses for every configured
//! stride, smooths and collapses them, extracts detections and finally
//! updates the tracker. The tracker is only touched once a complete detection
//! set exists, so a failed or cancelled tick leaves it unchanged.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use gabor_tracker_signal::{
    Event, EventFrame, FilterBank, FrameWindow, GaussianSmoother, MovingAverage, ResponseEngine,
    ResponseMaps, SignalError,
};

use crate::config::{ConfigError, GaborTrackerConfig};
use crate::detection::{
    CandidateExtractor, Detection, MultiChannelExtractor, WeightedBoxFusion,
};
use crate::tracking::{MultiObjectTracker, TrackSnapshot};
use crate::{Result, TrackerError};

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Running means of the per-stage durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    /// Filter response, smoothing and activation collapse
    pub response: MovingAverage,
    /// Thresholding and clustering (all channels in fusion mode)
    pub clustering: MovingAverage,
    /// Box construction (fusion in fusion mode)
    pub boxes: MovingAverage,
    /// Tracker update
    pub tracking: MovingAverage,
}

impl StageTimings {
    /// Mean durations in milliseconds.
    pub fn report(&self) -> TimingReport {
        let ms = |avg: &MovingAverage| avg.mean().ok().map(|ns| ns / 1e6);
        TimingReport {
            response_ms: ms(&self.response),
            clustering_ms: ms(&self.clustering),
            boxes_ms: ms(&self.boxes),
            tracking_ms: ms(&self.tracking),
            samples: self.tracking.count(),
        }
    }

    /// Discard all samples
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mean stage durations; `None` for a stage that has not run yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingReport {
    /// Mean response time (ms)
    pub response_ms: Option<f64>,
    /// Mean clustering time (ms)
    pub clustering_ms: Option<f64>,
    /// Mean box time (ms)
    pub boxes_ms: Option<f64>,
    /// Mean tracking time (ms)
    pub tracking_ms: Option<f64>,
    /// Completed ticks
    pub samples: u64,
}

// ---------------------------------------------------------------------------
// TickOutput
// ---------------------------------------------------------------------------

/// Result of one processed tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutput {
    /// 1-based count of frames pushed so far
    pub tick: u64,
    /// 1-based index of the frame at the window centre; `None` while the
    /// centre still holds pre-fill
    pub frame_number: Option<u64>,
    /// Detections handed to the tracker (pixel coordinates)
    pub detections: Vec<Detection>,
    /// Reported tracks, sorted by id
    pub tracks: Vec<TrackSnapshot>,
}

// ---------------------------------------------------------------------------
// GaborTracker
// ---------------------------------------------------------------------------

/// Event-to-track session.
#[derive(Debug)]
pub struct GaborTracker {
    config: GaborTrackerConfig,
    bank: FilterBank,
    window: FrameWindow,
    engine: ResponseEngine,
    smoother: GaussianSmoother,
    extractor: CandidateExtractor,
    fusion: Option<MultiChannelExtractor>,
    tracker: MultiObjectTracker,
    timings: StageTimings,
    tick: u64,
    last_timestamp: Option<i64>,
}

impl GaborTracker {
    /// Create a session for a `height x width` sensor.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] for an invalid configuration or a
    /// filter bank whose temporal depth differs from
    /// `filter_temporal_depth`.
    pub fn new(
        config: GaborTrackerConfig,
        bank: FilterBank,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        config.validate()?;
        if bank.temporal_depth() != config.filter_temporal_depth {
            return Err(ConfigError::invalid_value(
                "filter_temporal_depth",
                format!(
                    "filter bank spans {} frames, configuration expects {}",
                    bank.temporal_depth(),
                    config.filter_temporal_depth
                ),
            )
            .into());
        }

        let window = FrameWindow::new(config.frame_window_depth, height, width)?;
        let engine = ResponseEngine::new(config.response_config())?;
        let smoother = GaussianSmoother::new(config.blur_kernel_size, config.blur_sigma)?;
        let extractor = CandidateExtractor::new(
            config.activation_threshold,
            config.cluster_radius,
            config.cluster_min_points,
        );

        let fusion = if config.use_multi_channel_fusion {
            Some(MultiChannelExtractor::new(
                extractor.clone(),
                WeightedBoxFusion::new(
                    config.fusion_iou_threshold,
                    config.fusion_skip_box_threshold,
                    config.fusion_score_mode,
                ),
                config.worker_threads,
            )?)
        } else {
            None
        };

        let tracker = MultiObjectTracker::new(config.tracker_config());

        tracing::info!(
            height,
            width,
            filters = bank.len(),
            depth = config.frame_window_depth,
            strides = ?config.temporal_strides,
            fusion = config.use_multi_channel_fusion,
            "Tracking session created"
        );

        Ok(Self {
            config,
            bank,
            window,
            engine,
            smoother,
            extractor,
            fusion,
            tracker,
            timings: StageTimings::default(),
            tick: 0,
            last_timestamp: None,
        })
    }

    /// Accumulate one batch of events into a frame and push it.
    ///
    /// Timestamps must be non-decreasing within the batch and not older than
    /// the last ingested event; otherwise [`TrackerError::OutOfOrder`] is
    /// returned and nothing changes. Returns the new frame.
    pub fn ingest(&mut self, events: &[Event]) -> Result<ArrayView2<'_, f32>> {
        let mut previous = self.last_timestamp;
        for ev in events {
            if let Some(prev) = previous {
                if ev.timestamp < prev {
                    return Err(TrackerError::OutOfOrder {
                        previous: prev,
                        found: ev.timestamp,
                    });
                }
            }
            previous = Some(ev.timestamp);
        }

        let (height, width) = self.window.shape();
        let (frame, _dropped) = EventFrame::accumulate(events, height, width);
        self.window.push(frame)?;
        self.last_timestamp = previous;
        self.tick += 1;

        Ok(self.window.newest())
    }

    /// Push a frame accumulated by the caller.
    pub fn push_frame(&mut self, frame: EventFrame) -> Result<()> {
        self.window.push(frame)?;
        self.tick += 1;
        Ok(())
    }

    /// Run detection and tracking on the current window.
    pub fn step(&mut self) -> Result<TickOutput> {
        self.run(None)
    }

    /// `ingest` followed by `step`.
    pub fn process_tick(&mut self, events: &[Event]) -> Result<TickOutput> {
        self.ingest(events)?;
        self.step()
    }

    /// Like [`process_tick`](Self::process_tick), abandoning detection when
    /// `cancel` is raised. A cancelled tick leaves the tracker untouched.
    pub fn process_tick_cancellable(
        &mut self,
        events: &[Event],
        cancel: &AtomicBool,
    ) -> Result<TickOutput> {
        self.ingest(events)?;
        self.run(Some(cancel))
    }

    fn run(&mut self, cancel: Option<&AtomicBool>) -> Result<TickOutput> {
        let check_cancel = || match cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(TrackerError::Cancelled),
            _ => Ok(()),
        };

        // ----------------------------------------------------------------
        // Response → smoothing → activation
        // ----------------------------------------------------------------
        let start = Instant::now();
        let maps = self.respond().map_err(|err| {
            if matches!(err, TrackerError::BufferUnderflow(_)) {
                tracing::warn!(tick = self.tick, error = %err, "Tick skipped");
            }
            err
        })?;
        let activation = maps.activation();
        self.timings.response.record(start.elapsed());
        check_cancel()?;

        // ----------------------------------------------------------------
        // Candidate extraction
        // ----------------------------------------------------------------
        let (normalized, timing) = match &self.fusion {
            Some(fusion) => fusion.extract(&maps, activation.peak(), cancel)?,
            None => self.extractor.extract_timed(activation.view()),
        };
        self.timings.clustering.record(timing.clustering);
        self.timings.boxes.record(timing.boxes);
        check_cancel()?;

        let (height, width) = self.window.shape();
        let detections: Vec<Detection> = normalized
            .iter()
            .map(|d| d.denormalize(width, height))
            .filter(|d| d.score > 0.0)
            .collect();

        // ----------------------------------------------------------------
        // Tracking
        // ----------------------------------------------------------------
        let start = Instant::now();
        let tracks = self.tracker.update(&detections);
        self.timings.tracking.record(start.elapsed());

        let half = (self.config.frame_window_depth / 2) as u64;
        let frame_number = self.tick.checked_sub(half).filter(|&n| n > 0);

        tracing::trace!(
            tick = self.tick,
            detections = detections.len(),
            tracks = tracks.len(),
            "Tick processed"
        );

        Ok(TickOutput {
            tick: self.tick,
            frame_number,
            detections,
            tracks,
        })
    }

    /// Smoothed responses of every (stride, filter) channel, stride-major.
    fn respond(&self) -> Result<ResponseMaps> {
        let depth = self.bank.temporal_depth();
        let mut parts = Vec::with_capacity(self.config.temporal_strides.len());

        for &stride in &self.config.temporal_strides {
            let view = self
                .window
                .centered_window(stride, depth)
                .map_err(|err| match err {
                    SignalError::WindowOutOfBounds { .. } => TrackerError::BufferUnderflow(err),
                    other => TrackerError::Signal(other),
                })?;
            parts.push(self.engine.respond(&view, &self.bank)?);
        }

        let mut maps = ResponseMaps::concat(parts)?;
        maps.smooth(&self.smoother);
        Ok(maps)
    }

    /// Running stage timings.
    pub fn timings(&self) -> TimingReport {
        self.timings.report()
    }

    /// Emit the stage timings through `tracing`.
    pub fn log_timings(&self) {
        let report = self.timings.report();
        tracing::info!(
            samples = report.samples,
            response_ms = ?report.response_ms,
            clustering_ms = ?report.clustering_ms,
            boxes_ms = ?report.boxes_ms,
            tracking_ms = ?report.tracking_ms,
            "Stage timings"
        );
    }

    /// Clear the window, the tracker, timings and ordering state.
    pub fn reset(&mut self) {
        self.window.reset();
        self.tracker.reset();
        self.timings.reset();
        self.tick = 0;
        self.last_timestamp = None;
    }

    /// Get the configuration
    pub fn config(&self) -> &GaborTrackerConfig {
        &self.config
    }

    /// Frames pushed since creation or the last reset
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Borrow the frame window
    pub fn frame_window(&self) -> &FrameWindow {
        &self.window
    }

    /// Borrow the tracker
    pub fn tracker(&self) -> &MultiObjectTracker {
        &self.tracker
    }

    /// Borrow the filter bank
    pub fn filter_bank(&self) -> &FilterBank {
        &self.bank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gabor_tracker_signal::Polarity;
    use ndarray::Array3;

    fn identity_bank() -> FilterBank {
        let mut k = Array3::<f32>::zeros((7, 3, 3));
        k[[3, 1, 1]] = 1.0;
        FilterBank::from_prepared(vec![k]).unwrap()
    }

    fn small_config() -> GaborTrackerConfig {
        GaborTrackerConfig::builder()
            .frame_window_depth(9)
            .activation_threshold(0.5)
            .build()
            .unwrap()
    }

    #[test]
    fn test_rejects_mismatched_bank_depth() {
        let bank = FilterBank::from_prepared(vec![Array3::<f32>::ones((5, 3, 3))]).unwrap();
        let err = GaborTracker::new(small_config(), bank, 16, 16).unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }

    #[test]
    fn test_out_of_order_batch_leaves_state_untouched() {
        let mut session = GaborTracker::new(small_config(), identity_bank(), 16, 16).unwrap();
        session.ingest(&[Event::new(100, 1, 1, Polarity::On)]).unwrap();

        let err = session
            .ingest(&[Event::new(150, 1, 1, Polarity::On), Event::new(120, 1, 1, Polarity::On)])
            .unwrap_err();
        assert!(matches!(err, TrackerError::OutOfOrder { previous: 150, found: 120 }));
        assert_eq!(session.tick(), 1);

        let err = session.ingest(&[Event::new(50, 1, 1, Polarity::On)]).unwrap_err();
        assert!(matches!(err, TrackerError::OutOfOrder { previous: 100, found: 50 }));
    }

    #[test]
    fn test_frame_number_counts_from_window_centre() {
        let mut session = GaborTracker::new(small_config(), identity_bank(), 16, 16).unwrap();
        let mut numbers = Vec::new();
        for t in 0..6 {
            numbers.push(session.process_tick(&[Event::new(t, 2, 2, Polarity::On)]).unwrap().frame_number);
        }
        assert_eq!(numbers, vec![None, None, None, None, Some(1), Some(2)]);
    }

    #[test]
    fn test_cancelled_tick_keeps_tracker() {
        let mut session = GaborTracker::new(small_config(), identity_bank(), 16, 16).unwrap();
        let flag = AtomicBool::new(true);
        let err = session
            .process_tick_cancellable(&[Event::new(0, 2, 2, Polarity::On)], &flag)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Cancelled));
        assert_eq!(session.tracker().track_count(), 0);
        assert_eq!(session.timings().tracking_ms, None);
    }

    #[test]
    fn test_timings_and_reset() {
        let mut session = GaborTracker::new(small_config(), identity_bank(), 16, 16).unwrap();
        session.process_tick(&[]).unwrap();
        session.process_tick(&[]).unwrap();
        let report = session.timings();
        assert_eq!(report.samples, 2);
        assert!(report.response_ms.is_some());
        session.log_timings();

        session.reset();
        assert_eq!(session.tick(), 0);
        assert_eq!(session.timings().samples, 0);
        session.ingest(&[Event::new(0, 0, 0, Polarity::Off)]).unwrap();
    }

    #[test]
    fn test_push_frame_shape_checked() {
        let mut session = GaborTracker::new(small_config(), identity_bank(), 16, 16).unwrap();
        assert!(session.push_frame(EventFrame::zeros(8, 8)).is_err());
        session.push_frame(EventFrame::zeros(16, 16)).unwrap();
        assert_eq!(session.tick(), 1);
    }
}
