//! Pipeline configuration.
//!
//! [`GaborTrackerConfig`] carries every tunable of the event-to-track
//! pipeline. It is serializable via [`serde`] so a run can be stored to and
//! restored from JSON.
//!
//! # Example
//!
//! ```rust
//! use gabor_tracker::config::GaborTrackerConfig;
//!
//! let cfg = GaborTrackerConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.frame_window_depth, 55);
//! assert_eq!(cfg.filter_temporal_depth, 7);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::detection::FusionScoreMode;
use crate::tracking::{AssignmentStrategy, DistanceMode, ReportPolicy, TrackerConfig};
use gabor_tracker_signal::ResponseConfig;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced while loading or validating a [`GaborTrackerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file `{path}`: {source}")]
    FileRead {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON.
    #[error("Cannot parse config file `{path}`: {source}")]
    Json {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// GaborTrackerConfig
// ---------------------------------------------------------------------------

/// Complete configuration of a tracking session.
///
/// Defaults reproduce the reference setup: a 55-frame window, 7-frame
/// kernels, threshold 8 and a norfair-style tracker gated at 40 pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaborTrackerConfig {
    // -----------------------------------------------------------------------
    // Frame window / filter bank
    // -----------------------------------------------------------------------
    /// Number of event frames held in the sliding window. Default: **55**.
    pub frame_window_depth: usize,

    /// Temporal depth of every kernel; must match the filter bank. Default: **7**.
    pub filter_temporal_depth: usize,

    /// Frame steps sampled per temporal scale, one channel group per entry.
    /// Default: **[1]**.
    pub temporal_strides: Vec<usize>,

    // -----------------------------------------------------------------------
    // Response post-processing
    // -----------------------------------------------------------------------
    /// Keep only per-row maxima inside each tile. Default: **false**.
    pub tile_suppression_enabled: bool,

    /// Tile side length in pixels. Default: **64**.
    pub tile_size: usize,

    /// Gaussian blur kernel size (odd). Default: **7**.
    pub blur_kernel_size: usize,

    /// Gaussian blur standard deviation. Default: **3.0**.
    pub blur_sigma: f32,

    // -----------------------------------------------------------------------
    // Candidate extraction
    // -----------------------------------------------------------------------
    /// Pixels strictly above this activation become candidates. Default: **8.0**.
    pub activation_threshold: f32,

    /// DBSCAN neighbourhood radius in pixels. Default: **3.0**.
    pub cluster_radius: f32,

    /// DBSCAN core-point neighbourhood size. Default: **15**.
    pub cluster_min_points: usize,

    // -----------------------------------------------------------------------
    // Multi-channel fusion
    // -----------------------------------------------------------------------
    /// Extract per channel and fuse instead of using the collapsed map.
    /// Default: **false**.
    pub use_multi_channel_fusion: bool,

    /// IoU a box must exceed to join a fused cluster. Default: **0.55**.
    pub fusion_iou_threshold: f32,

    /// Boxes scoring below this are ignored by fusion. Default: **0.0**.
    pub fusion_skip_box_threshold: f32,

    /// How fused scores are computed. Default: **Average**.
    pub fusion_score_mode: FusionScoreMode,

    /// Worker threads for fusion mode; `None` uses available parallelism.
    pub worker_threads: Option<usize>,

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------
    /// Gate on track/detection distance in pixels (strict). Default: **40**.
    pub distance_threshold: f32,

    /// Position representation used for matching. Default: **Center**.
    pub distance_mode: DistanceMode,

    /// Assignment algorithm. Default: **Greedy**.
    pub assignment: AssignmentStrategy,

    /// Misses after which a lost track is deleted. Default: **30**.
    pub hit_counter_max: u32,

    /// Consecutive hits needed to confirm a track. Default: **3**.
    pub initialization_delay: u32,

    /// Consecutive misses before a confirmed track becomes lost. Default: **1**.
    pub max_confirmed_misses: u32,

    /// Which tracks are reported each tick. Default: **EverConfirmed**.
    pub report_policy: ReportPolicy,
}

impl Default for GaborTrackerConfig {
    fn default() -> Self {
        Self {
            frame_window_depth: 55,
            filter_temporal_depth: 7,
            temporal_strides: vec![1],
            tile_suppression_enabled: false,
            tile_size: 64,
            blur_kernel_size: 7,
            blur_sigma: 3.0,
            activation_threshold: 8.0,
            cluster_radius: 3.0,
            cluster_min_points: 15,
            use_multi_channel_fusion: false,
            fusion_iou_threshold: 0.55,
            fusion_skip_box_threshold: 0.0,
            fusion_score_mode: FusionScoreMode::Average,
            worker_threads: None,
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

impl GaborTrackerConfig {
    /// Create a builder starting from the defaults
    pub fn builder() -> GaborTrackerConfigBuilder {
        GaborTrackerConfigBuilder::default()
    }

    /// Load a configuration from a JSON file at `path` and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened,
    /// [`ConfigError::Json`] if it is malformed and
    /// [`ConfigError::InvalidValue`] if a field is out of range.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: GaborTrackerConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this configuration as pretty-printed JSON, creating parent
    /// directories if necessary.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Validate all fields and return an error describing the first problem
    /// found.
    ///
    /// # Validated invariants
    ///
    /// - Window and kernel depths are positive and the kernel fits the window.
    /// - Strides are non-empty, positive, and every strided window fits.
    /// - Blur kernel is odd and sigma positive.
    /// - Threshold is finite and non-negative; radius and distance gate positive.
    /// - IoU threshold lies in `[0, 1]`.
    /// - Lifecycle counters are coherent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Window / bank
        if self.frame_window_depth == 0 {
            return Err(ConfigError::invalid_value("frame_window_depth", "must be > 0"));
        }
        if self.filter_temporal_depth == 0 {
            return Err(ConfigError::invalid_value("filter_temporal_depth", "must be > 0"));
        }
        if self.filter_temporal_depth > self.frame_window_depth {
            return Err(ConfigError::invalid_value(
                "filter_temporal_depth",
                format!(
                    "must be <= frame_window_depth ({}), got {}",
                    self.frame_window_depth, self.filter_temporal_depth
                ),
            ));
        }
        if self.temporal_strides.is_empty() {
            return Err(ConfigError::invalid_value("temporal_strides", "must not be empty"));
        }
        for &stride in &self.temporal_strides {
            if stride == 0 {
                return Err(ConfigError::invalid_value("temporal_strides", "strides must be > 0"));
            }
            let span = (self.filter_temporal_depth / 2).saturating_mul(stride);
            let reach = self.frame_window_depth / 2;
            let tail = (self.filter_temporal_depth - 1 - self.filter_temporal_depth / 2)
                .saturating_mul(stride);
            if span > reach || reach.saturating_add(tail) >= self.frame_window_depth {
                return Err(ConfigError::invalid_value(
                    "temporal_strides",
                    format!(
                        "stride {} spans beyond a {}-frame window",
                        stride, self.frame_window_depth
                    ),
                ));
            }
        }

        // Post-processing
        if self.tile_size == 0 {
            return Err(ConfigError::invalid_value("tile_size", "must be > 0"));
        }
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(ConfigError::invalid_value(
                "blur_kernel_size",
                "must be odd and > 0",
            ));
        }
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(ConfigError::invalid_value("blur_sigma", "must be > 0.0"));
        }

        // Extraction
        if !(self.activation_threshold.is_finite() && self.activation_threshold >= 0.0) {
            return Err(ConfigError::invalid_value(
                "activation_threshold",
                "must be finite and >= 0.0",
            ));
        }
        if !(self.cluster_radius.is_finite() && self.cluster_radius > 0.0) {
            return Err(ConfigError::invalid_value("cluster_radius", "must be > 0.0"));
        }
        if self.cluster_min_points == 0 {
            return Err(ConfigError::invalid_value("cluster_min_points", "must be > 0"));
        }

        // Fusion
        if !(0.0..=1.0).contains(&self.fusion_iou_threshold) {
            return Err(ConfigError::invalid_value(
                "fusion_iou_threshold",
                "must be in [0.0, 1.0]",
            ));
        }
        if !self.fusion_skip_box_threshold.is_finite() {
            return Err(ConfigError::invalid_value(
                "fusion_skip_box_threshold",
                "must be finite",
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::invalid_value("worker_threads", "must be > 0"));
        }

        // Tracking
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(ConfigError::invalid_value("distance_threshold", "must be > 0.0"));
        }
        if self.initialization_delay == 0 {
            return Err(ConfigError::invalid_value("initialization_delay", "must be > 0"));
        }
        if self.max_confirmed_misses == 0 {
            return Err(ConfigError::invalid_value("max_confirmed_misses", "must be > 0"));
        }
        if self.max_confirmed_misses > self.hit_counter_max.saturating_add(1) {
            return Err(ConfigError::invalid_value(
                "max_confirmed_misses",
                format!("must be <= hit_counter_max + 1 ({})", self.hit_counter_max + 1),
            ));
        }

        Ok(())
    }

    /// Response engine settings derived from this configuration.
    pub fn response_config(&self) -> ResponseConfig {
        ResponseConfig {
            tile_suppression: self.tile_suppression_enabled,
            tile_size: self.tile_size,
        }
    }

    /// Tracker settings derived from this configuration.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            distance_threshold: self.distance_threshold,
            distance_mode: self.distance_mode,
            assignment: self.assignment,
            hit_counter_max: self.hit_counter_max,
            initialization_delay: self.initialization_delay,
            max_confirmed_misses: self.max_confirmed_misses,
            report_policy: self.report_policy,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`GaborTrackerConfig`]
#[derive(Debug, Default)]
pub struct GaborTrackerConfigBuilder {
    config: GaborTrackerConfig,
}

impl GaborTrackerConfigBuilder {
    /// Set the sliding window depth
    pub fn frame_window_depth(mut self, depth: usize) -> Self {
        self.config.frame_window_depth = depth;
        self
    }

    /// Set the kernel temporal depth
    pub fn filter_temporal_depth(mut self, depth: usize) -> Self {
        self.config.filter_temporal_depth = depth;
        self
    }

    /// Set the temporal strides
    pub fn temporal_strides(mut self, strides: Vec<usize>) -> Self {
        self.config.temporal_strides = strides;
        self
    }

    /// Enable or disable tile suppression
    pub fn tile_suppression(mut self, enabled: bool) -> Self {
        self.config.tile_suppression_enabled = enabled;
        self
    }

    /// Set the suppression tile size
    pub fn tile_size(mut self, size: usize) -> Self {
        self.config.tile_size = size;
        self
    }

    /// Set the Gaussian blur kernel size and sigma
    pub fn blur(mut self, kernel_size: usize, sigma: f32) -> Self {
        self.config.blur_kernel_size = kernel_size;
        self.config.blur_sigma = sigma;
        self
    }

    /// Set the activation threshold
    pub fn activation_threshold(mut self, threshold: f32) -> Self {
        self.config.activation_threshold = threshold;
        self
    }

    /// Set DBSCAN radius and minimum points
    pub fn clustering(mut self, radius: f32, min_points: usize) -> Self {
        self.config.cluster_radius = radius;
        self.config.cluster_min_points = min_points;
        self
    }

    /// Enable or disable multi-channel fusion
    pub fn multi_channel_fusion(mut self, enabled: bool) -> Self {
        self.config.use_multi_channel_fusion = enabled;
        self
    }

    /// Set the fusion IoU threshold
    pub fn fusion_iou_threshold(mut self, threshold: f32) -> Self {
        self.config.fusion_iou_threshold = threshold;
        self
    }

    /// Set the fusion score mode
    pub fn fusion_score_mode(mut self, mode: FusionScoreMode) -> Self {
        self.config.fusion_score_mode = mode;
        self
    }

    /// Set the number of fusion worker threads
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = Some(threads);
        self
    }

    /// Set the tracker distance gate
    pub fn distance_threshold(mut self, threshold: f32) -> Self {
        self.config.distance_threshold = threshold;
        self
    }

    /// Set the distance mode
    pub fn distance_mode(mut self, mode: DistanceMode) -> Self {
        self.config.distance_mode = mode;
        self
    }

    /// Set the assignment strategy
    pub fn assignment(mut self, strategy: AssignmentStrategy) -> Self {
        self.config.assignment = strategy;
        self
    }

    /// Set the lost-track deletion horizon
    pub fn hit_counter_max(mut self, max: u32) -> Self {
        self.config.hit_counter_max = max;
        self
    }

    /// Set the confirmation delay
    pub fn initialization_delay(mut self, delay: u32) -> Self {
        self.config.initialization_delay = delay;
        self
    }

    /// Set misses tolerated before a confirmed track is lost
    pub fn max_confirmed_misses(mut self, misses: u32) -> Self {
        self.config.max_confirmed_misses = misses;
        self
    }

    /// Set the report policy
    pub fn report_policy(mut self, policy: ReportPolicy) -> Self {
        self.config.report_policy = policy;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<GaborTrackerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
