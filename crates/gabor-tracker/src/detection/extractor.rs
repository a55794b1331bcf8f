//! Candidate extraction: threshold, cluster, box.

use ndarray::ArrayView2;
use std::time::{Duration, Instant};

use super::dbscan::Dbscan;
use super::types::{CandidateRegion, Detection};
use gabor_tracker_signal::{ActivationMap, SignalError};

/// Wall-clock cost of one extraction call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractionTiming {
    /// Thresholding and clustering
    pub clustering: Duration,
    /// Box and score construction
    pub boxes: Duration,
}

impl ExtractionTiming {
    /// Accumulate another timing into this one.
    pub fn add(&mut self, other: ExtractionTiming) {
        self.clustering += other.clustering;
        self.boxes += other.boxes;
    }
}

/// Turns an activation map into normalized detections.
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    threshold: f32,
    dbscan: Dbscan,
}

impl CandidateExtractor {
    /// Create an extractor.
    pub fn new(threshold: f32, cluster_radius: f32, cluster_min_points: usize) -> Self {
        Self {
            threshold,
            dbscan: Dbscan::new(cluster_radius, cluster_min_points),
        }
    }

    /// Activation threshold (strict)
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Detections found in `map`, boxes normalized to `[0, 1]`.
    pub fn extract(&self, map: &ActivationMap) -> Vec<Detection> {
        self.extract_timed(map.view()).0
    }

    /// Clustered regions found in `map`.
    pub fn regions(&self, map: &ActivationMap) -> Vec<CandidateRegion> {
        self.regions_in(map.view()).unwrap_or_else(|err| {
            tracing::trace!(error = %err, "No candidate regions");
            Vec::new()
        })
    }

    /// Extract from any 2-D map and report how long each phase took.
    ///
    /// Degenerate (constant) maps produce no detections.
    pub fn extract_timed(&self, map: ArrayView2<'_, f32>) -> (Vec<Detection>, ExtractionTiming) {
        let mut timing = ExtractionTiming::default();
        let (height, width) = map.dim();

        let start = Instant::now();
        let regions = match self.regions_in(map) {
            Ok(regions) => regions,
            Err(err) => {
                tracing::trace!(error = %err, "Skipping extraction");
                Vec::new()
            }
        };
        timing.clustering = start.elapsed();

        let start = Instant::now();
        let detections = regions
            .iter()
            .map(|r| r.to_detection(height, width))
            .collect();
        timing.boxes = start.elapsed();

        (detections, timing)
    }

    fn regions_in(&self, map: ArrayView2<'_, f32>) -> Result<Vec<CandidateRegion>, SignalError> {
        let (min, max) = map
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if max <= min || max.is_nan() {
            return Err(SignalError::DegenerateInput(format!(
                "map is constant ({})",
                max
            )));
        }

        let pixels: Vec<(usize, usize)> = map
            .indexed_iter()
            .filter(|(_, v)| **v > self.threshold)
            .map(|(idx, _)| idx)
            .collect();
        if pixels.len() < 2 {
            return Ok(Vec::new());
        }

        let points: Vec<[f32; 2]> = pixels
            .iter()
            .map(|&(r, c)| [r as f32, c as f32])
            .collect();

        let regions = self
            .dbscan
            .clusters(&points)
            .into_iter()
            .map(|members| {
                let points: Vec<(usize, usize)> = members.iter().map(|&i| pixels[i]).collect();
                let peak_score = points
                    .iter()
                    .map(|&idx| map[idx])
                    .fold(f32::NEG_INFINITY, f32::max);
                CandidateRegion { points, peak_score }
            })
            .collect::<Vec<_>>();

        tracing::trace!(
            candidates = pixels.len(),
            regions = regions.len(),
            "Candidate pixels clustered"
        );

        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn map_with_blob(h: usize, w: usize, top: usize, left: usize, side: usize, value: f32) -> Array2<f32> {
        let mut data = Array2::zeros((h, w));
        for r in top..top + side {
            for c in left..left + side {
                data[[r, c]] = value;
            }
        }
        data
    }

    #[test]
    fn test_all_below_threshold_is_empty() {
        let data = map_with_blob(32, 32, 4, 4, 5, 7.5);
        let map = ActivationMap::from_array(data);
        assert!(CandidateExtractor::new(8.0, 3.0, 15).extract(&map).is_empty());
    }

    #[test]
    fn test_single_blob_gives_tight_box() {
        let mut data = map_with_blob(40, 50, 10, 20, 5, 9.0);
        data[[12, 22]] = 12.0;
        let map = ActivationMap::from_array(data);

        let dets = CandidateExtractor::new(8.0, 3.0, 15).extract(&map);
        assert_eq!(dets.len(), 1);
        let b = dets[0].bbox;
        assert_abs_diff_eq!(b.x_min, 20.0 / 50.0);
        assert_abs_diff_eq!(b.x_max, 24.0 / 50.0);
        assert_abs_diff_eq!(b.y_min, 10.0 / 40.0);
        assert_abs_diff_eq!(b.y_max, 14.0 / 40.0);
        assert_abs_diff_eq!(dets[0].score, 12.0);
    }

    #[test]
    fn test_small_blob_is_noise() {
        let data = map_with_blob(32, 32, 4, 4, 3, 10.0);
        let map = ActivationMap::from_array(data);
        assert!(CandidateExtractor::new(8.0, 3.0, 15).extract(&map).is_empty());
    }

    #[test]
    fn test_constant_map_is_degenerate_and_empty() {
        let map = ActivationMap::from_array(Array2::from_elem((16, 16), 20.0));
        let extractor = CandidateExtractor::new(8.0, 3.0, 15);
        assert!(extractor.extract(&map).is_empty());
        assert!(extractor.regions(&map).is_empty());
    }

    #[test]
    fn test_regions_expose_points() {
        let data = map_with_blob(32, 32, 0, 0, 4, 9.0);
        let regions = CandidateExtractor::new(8.0, 3.0, 15).regions(&ActivationMap::from_array(data));
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].points.len(), 16);
        assert_eq!(regions[0].points[0], (0, 0));
    }

    #[test]
    fn test_negative_channel_values_are_ignored() {
        let mut data = map_with_blob(32, 32, 8, 8, 5, 9.0);
        data[[0, 0]] = -50.0;
        let (dets, _) = CandidateExtractor::new(8.0, 3.0, 15).extract_timed(data.view());
        assert_eq!(dets.len(), 1);
    }
}
