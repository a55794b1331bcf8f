//! Candidate detection from activation and response maps.
//!
//! - **[`CandidateExtractor`]**: threshold + DBSCAN on a single map
//! - **[`MultiChannelExtractor`]**: per-channel extraction on a worker pool
//! - **[`WeightedBoxFusion`]**: merges per-channel boxes into one set

pub mod dbscan;
mod extractor;
mod fusion;
mod types;

pub use dbscan::{ClusterLabel, Dbscan};
pub use extractor::{CandidateExtractor, ExtractionTiming};
pub use fusion::{FusionScoreMode, MultiChannelExtractor, WeightedBoxFusion};
pub use types::{BoundingBox, CandidateRegion, Detection};
