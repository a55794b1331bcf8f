//! Multi-channel extraction and weighted box fusion.
//!
//! In fusion mode the candidate extractor runs on every smoothed response
//! channel instead of the collapsed activation map. Channels are processed in
//! parallel on a dedicated rayon pool and joined before their boxes are
//! merged into a single detection set.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::extractor::{CandidateExtractor, ExtractionTiming};
use super::types::{BoundingBox, Detection};
use crate::{Result, TrackerError};
use gabor_tracker_signal::ResponseMaps;

/// How the score of a fused box is derived from its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FusionScoreMode {
    /// Mean member score
    #[default]
    Average,
    /// Mean member score scaled by `min(channels, members) / channels`
    ChannelRescaled,
}

// ---------------------------------------------------------------------------
// WeightedBoxFusion
// ---------------------------------------------------------------------------

/// Weighted box fusion over several detection lists.
#[derive(Debug, Clone)]
pub struct WeightedBoxFusion {
    iou_threshold: f32,
    skip_box_threshold: f32,
    score_mode: FusionScoreMode,
}

/// A fused box under construction.
struct FusedCluster {
    members: Vec<Detection>,
    fused: Detection,
}

impl FusedCluster {
    fn new(det: Detection) -> Self {
        Self {
            members: vec![det],
            fused: det,
        }
    }

    fn push(&mut self, det: Detection) {
        self.members.push(det);
        self.fused = weighted_box(&self.members);
    }
}

/// Score-weighted mean box with the mean member score.
fn weighted_box(members: &[Detection]) -> Detection {
    let total: f32 = members.iter().map(|d| d.score).sum();
    let n = members.len() as f32;

    let mut coords = [0.0f32; 4];
    for det in members {
        let w = if total > 0.0 { det.score } else { 1.0 };
        for (acc, v) in coords.iter_mut().zip(det.bbox.corners()) {
            *acc += w * v;
        }
    }
    let norm = if total > 0.0 { total } else { n };
    coords.iter_mut().for_each(|c| *c /= norm);

    Detection::new(
        BoundingBox::new(coords[0], coords[1], coords[2], coords[3]),
        total / n,
    )
}

impl WeightedBoxFusion {
    /// Create a fusion stage
    pub fn new(iou_threshold: f32, skip_box_threshold: f32, score_mode: FusionScoreMode) -> Self {
        Self {
            iou_threshold,
            skip_box_threshold,
            score_mode,
        }
    }

    /// Fuse normalized detections from several channels.
    ///
    /// Boxes are clipped to the unit square; boxes scoring below the skip
    /// threshold or with zero area are ignored. The remaining boxes are
    /// visited by descending score and join the fused box they overlap best
    /// when that IoU is strictly above the threshold. Output is sorted by
    /// descending score.
    pub fn fuse(&self, channels: &[Vec<Detection>]) -> Vec<Detection> {
        let mut boxes: Vec<Detection> = channels
            .iter()
            .flatten()
            .filter(|d| d.score >= self.skip_box_threshold)
            .map(|d| Detection::new(d.bbox.clipped_unit(), d.score))
            .filter(|d| d.bbox.area() > 0.0)
            .collect();

        // stable: equal scores keep channel order
        boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut clusters: Vec<FusedCluster> = Vec::new();
        for det in boxes {
            let mut best: Option<(usize, f32)> = None;
            for (idx, cluster) in clusters.iter().enumerate() {
                let iou = cluster.fused.bbox.iou(&det.bbox);
                if iou > self.iou_threshold && best.map_or(true, |(_, b)| iou > b) {
                    best = Some((idx, iou));
                }
            }
            match best {
                Some((idx, _)) => clusters[idx].push(det),
                None => clusters.push(FusedCluster::new(det)),
            }
        }

        let n_channels = channels.len().max(1) as f32;
        let mut fused: Vec<Detection> = clusters
            .into_iter()
            .map(|c| {
                let mut det = c.fused;
                if self.score_mode == FusionScoreMode::ChannelRescaled {
                    det.score *= (c.members.len() as f32).min(n_channels) / n_channels;
                }
                det
            })
            .collect();

        fused.sort_by(|a, b| b.score.total_cmp(&a.score));
        fused
    }
}

// ---------------------------------------------------------------------------
// MultiChannelExtractor
// ---------------------------------------------------------------------------

/// Runs a [`CandidateExtractor`] over every response channel in parallel and
/// fuses the results.
pub struct MultiChannelExtractor {
    extractor: CandidateExtractor,
    fusion: WeightedBoxFusion,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for MultiChannelExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiChannelExtractor")
            .field("extractor", &self.extractor)
            .field("fusion", &self.fusion)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl MultiChannelExtractor {
    /// Create an extractor with its own worker pool.
    ///
    /// `worker_threads` of `None` sizes the pool to the available hardware
    /// parallelism.
    pub fn new(
        extractor: CandidateExtractor,
        fusion: WeightedBoxFusion,
        worker_threads: Option<usize>,
    ) -> Result<Self> {
        let threads = worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gabor-fusion-{}", i))
            .build()?;

        tracing::debug!(threads, "Fusion worker pool started");

        Ok(Self {
            extractor,
            fusion,
            pool,
        })
    }

    /// Number of worker threads
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Extract per channel, normalize scores by `peak` and fuse.
    ///
    /// A non-positive or non-finite `peak` yields no detections. When
    /// `cancel` is raised the tick is abandoned with
    /// [`TrackerError::Cancelled`].
    pub fn extract(
        &self,
        maps: &ResponseMaps,
        peak: f32,
        cancel: Option<&AtomicBool>,
    ) -> Result<(Vec<Detection>, ExtractionTiming)> {
        let mut timing = ExtractionTiming::default();
        if !(peak.is_finite() && peak > 0.0) {
            tracing::trace!(peak, "Degenerate activation peak, skipping fusion");
            return Ok((Vec::new(), timing));
        }

        let cancelled = || cancel.map_or(false, |flag| flag.load(Ordering::Relaxed));

        let start = Instant::now();
        let per_channel: Vec<Option<Vec<Detection>>> = self.pool.install(|| {
            (0..maps.num_channels())
                .into_par_iter()
                .map(|c| {
                    if cancelled() {
                        return None;
                    }
                    let (mut dets, _) = self.extractor.extract_timed(maps.channel(c));
                    dets.iter_mut().for_each(|d| d.score /= peak);
                    Some(dets)
                })
                .collect()
        });
        timing.clustering = start.elapsed();

        if cancelled() || per_channel.iter().any(Option::is_none) {
            return Err(TrackerError::Cancelled);
        }
        let per_channel: Vec<Vec<Detection>> = per_channel.into_iter().flatten().collect();

        let start = Instant::now();
        let fused = self.fusion.fuse(&per_channel);
        timing.boxes = start.elapsed();

        tracing::trace!(
            channels = per_channel.len(),
            raw = per_channel.iter().map(Vec::len).sum::<usize>(),
            fused = fused.len(),
            "Channel detections fused"
        );

        Ok((fused, timing))
    }
}
