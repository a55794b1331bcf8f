//! Filter-bank response engine.
//!
//! Computes one response map per kernel by correlating a temporal window of
//! event frames with each prepared (pre-flipped) kernel, using zero padding
//! so the output keeps the frame size. Optional tile suppression keeps only
//! the strongest response of every tile row.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

use crate::filter_bank::FilterBank;
use crate::frame_window::TemporalWindow;
use crate::smoothing::GaussianSmoother;
use crate::{Result, SignalError};

/// Configuration for the response engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Keep only per-row maxima inside each tile
    pub tile_suppression: bool,
    /// Side length of suppression tiles in pixels
    pub tile_size: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            tile_suppression: false,
            tile_size: 64,
        }
    }
}

impl ResponseConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(SignalError::InvalidConfig(
                "tile_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Applies a [`FilterBank`] to temporal windows.
#[derive(Debug, Clone)]
pub struct ResponseEngine {
    config: ResponseConfig,
}

impl ResponseEngine {
    /// Create a new engine
    pub fn new(config: ResponseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create an engine with default configuration
    pub fn with_defaults() -> Self {
        Self {
            config: ResponseConfig::default(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    /// Response of every kernel in `bank` to `window`, shaped
    /// `(kernels, height, width)`.
    pub fn respond(&self, window: &TemporalWindow<'_>, bank: &FilterBank) -> Result<Array3<f32>> {
        if window.len() != bank.temporal_depth() {
            return Err(SignalError::ShapeMismatch {
                expected: vec![bank.temporal_depth()],
                actual: vec![window.len()],
            });
        }
        let (height, width) = window
            .frame_dim()
            .ok_or_else(|| SignalError::DegenerateInput("empty temporal window".into()))?;
        let (kh, kw) = bank.spatial_dim();
        let (ph, pw) = (((kh - 1) / 2) as isize, ((kw - 1) / 2) as isize);

        // Event frames are sparse: gather the active pixels once per frame and
        // scatter them through every kernel.
        let active: Vec<Vec<(isize, isize, f32)>> = window
            .frames()
            .iter()
            .map(|frame| {
                frame
                    .indexed_iter()
                    .filter(|(_, v)| **v != 0.0)
                    .map(|((y, x), &v)| (y as isize, x as isize, v))
                    .collect()
            })
            .collect();

        let mut out = Array3::<f32>::zeros((bank.len(), height, width));
        let (h, w) = (height as isize, width as isize);

        for (kernel, mut plane) in bank.iter().zip(out.axis_iter_mut(Axis(0))) {
            for (t, pixels) in active.iter().enumerate() {
                let taps = kernel.index_axis(Axis(0), t);
                for &(yi, xi, v) in pixels {
                    for ((dy, dx), &k) in taps.indexed_iter() {
                        if k == 0.0 {
                            continue;
                        }
                        let y = yi + ph - dy as isize;
                        let x = xi + pw - dx as isize;
                        if y >= 0 && y < h && x >= 0 && x < w {
                            plane[[y as usize, x as usize]] += v * k;
                        }
                    }
                }
            }

            if self.config.tile_suppression {
                suppress_tiles(plane.view_mut(), self.config.tile_size);
            }
        }

        tracing::trace!(
            filters = bank.len(),
            active = active.iter().map(Vec::len).sum::<usize>(),
            "Filter bank response computed"
        );

        Ok(out)
    }
}

/// Within each `tile x tile` block, zero every value that is not the maximum
/// of its row inside the block. Ties keep all maximal values.
pub fn suppress_tiles(mut map: ArrayViewMut2<'_, f32>, tile: usize) {
    let (height, width) = map.dim();
    if tile == 0 {
        return;
    }

    for i in (0..height).step_by(tile) {
        let i_end = (i + tile).min(height);
        for j in (0..width).step_by(tile) {
            let j_end = (j + tile).min(width);
            let mut block = map.slice_mut(s![i..i_end, j..j_end]);
            for mut row in block.rows_mut() {
                let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                row.mapv_inplace(|v| if v == max { v } else { 0.0 });
            }
        }
    }
}

/// Stacked per-channel response maps `(channels, height, width)`.
#[derive(Debug, Clone)]
pub struct ResponseMaps {
    channels: Array3<f32>,
}

impl ResponseMaps {
    /// Wrap stacked responses.
    pub fn new(channels: Array3<f32>) -> Self {
        Self { channels }
    }

    /// Concatenate several response stacks along the channel axis.
    pub fn concat(parts: Vec<Array3<f32>>) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| SignalError::DegenerateInput("no response maps to stack".into()))?;
        let (_, h, w) = first.dim();

        if let Some(bad) = parts.iter().find(|p| (p.dim().1, p.dim().2) != (h, w)) {
            return Err(SignalError::ShapeMismatch {
                expected: vec![h, w],
                actual: vec![bad.dim().1, bad.dim().2],
            });
        }

        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let channels =
            ndarray::concatenate(Axis(0), &views).map_err(|_| SignalError::ShapeMismatch {
                expected: vec![h, w],
                actual: views.iter().flat_map(|v| v.shape().to_vec()).collect(),
            })?;

        Ok(Self { channels })
    }

    /// Blur every channel in place.
    pub fn smooth(&mut self, smoother: &GaussianSmoother) {
        for plane in self.channels.axis_iter_mut(Axis(0)) {
            smoother.smooth_inplace(plane);
        }
    }

    /// Per-pixel maximum over all channels, clamped to be non-negative.
    pub fn activation(&self) -> ActivationMap {
        let (_, h, w) = self.channels.dim();
        let mut data = Array2::<f32>::zeros((h, w));
        for plane in self.channels.axis_iter(Axis(0)) {
            ndarray::Zip::from(&mut data)
                .and(&plane)
                .for_each(|acc, &v| *acc = acc.max(v));
        }
        ActivationMap { data }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len_of(Axis(0))
    }

    /// Map shape as `(height, width)`.
    pub fn map_dim(&self) -> (usize, usize) {
        let (_, h, w) = self.channels.dim();
        (h, w)
    }

    /// Channel `index`, unclamped.
    pub fn channel(&self, index: usize) -> ArrayView2<'_, f32> {
        self.channels.index_axis(Axis(0), index)
    }

    /// All channels.
    pub fn as_array(&self) -> &Array3<f32> {
        &self.channels
    }
}

/// Non-negative scalar activation per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationMap {
    data: Array2<f32>,
}

impl ActivationMap {
    /// Wrap an array, clamping negative values to zero.
    pub fn from_array(mut data: Array2<f32>) -> Self {
        data.mapv_inplace(|v| v.max(0.0));
        Self { data }
    }

    /// Borrow the map.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Shape as `(height, width)`.
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Largest activation value (0.0 for an empty map).
    pub fn peak(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventFrame;
    use crate::frame_window::FrameWindow;
    use approx::assert_abs_diff_eq;

    fn single_tap_bank(depth: usize, t: usize, y: usize, x: usize, value: f32) -> FilterBank {
        let mut k = Array3::zeros((depth, 3, 3));
        k[[t, y, x]] = value;
        FilterBank::from_prepared(vec![k]).unwrap()
    }

    #[test]
    fn test_centre_tap_is_identity() {
        let mut window = FrameWindow::new(3, 5, 5).unwrap();
        let mut frame = Array2::zeros((5, 5));
        frame[[2, 3]] = 1.0;
        window.push(EventFrame::from_array(frame)).unwrap();

        let view = window.window(1, 1, -1).unwrap();
        let bank = single_tap_bank(1, 0, 1, 1, 2.0);
        let out = ResponseEngine::with_defaults().respond(&view, &bank).unwrap();

        assert_eq!(out.dim(), (1, 5, 5));
        assert_abs_diff_eq!(out[[0, 2, 3]], 2.0);
        assert_abs_diff_eq!(out.sum(), 2.0);
    }

    #[test]
    fn test_correlation_direction() {
        // out[y, x] = sum k[dy, dx] * in[y + dy - 1, x + dx - 1]
        // a tap at (0, 0) reads the pixel up-left, so the input at (2, 2)
        // lands on output (3, 3).
        let mut window = FrameWindow::new(1, 5, 5).unwrap();
        let mut frame = Array2::zeros((5, 5));
        frame[[2, 2]] = -1.0;
        window.push(EventFrame::from_array(frame)).unwrap();

        let view = window.window(1, 1, 0).unwrap();
        let bank = single_tap_bank(1, 0, 0, 0, 1.0);
        let out = ResponseEngine::with_defaults().respond(&view, &bank).unwrap();
        assert_abs_diff_eq!(out[[0, 3, 3]], -1.0);
        assert_abs_diff_eq!(out.sum(), -1.0);
    }

    #[test]
    fn test_temporal_depth_mismatch() {
        let window = FrameWindow::new(5, 4, 4).unwrap();
        let view = window.window(1, 3, -1).unwrap();
        let bank = single_tap_bank(2, 0, 1, 1, 1.0);
        assert!(matches!(
            ResponseEngine::with_defaults().respond(&view, &bank),
            Err(SignalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_tile_suppression_keeps_row_maxima() {
        let mut map = Array2::from_shape_vec(
            (2, 4),
            vec![1.0, 3.0, 2.0, 5.0, 4.0, 4.0, 0.5, 1.0],
        )
        .unwrap();
        suppress_tiles(map.view_mut(), 2);
        assert_eq!(
            map,
            Array2::from_shape_vec((2, 4), vec![0.0, 3.0, 0.0, 5.0, 4.0, 4.0, 0.0, 1.0]).unwrap()
        );
    }

    #[test]
    fn test_engine_applies_tile_suppression_per_kernel() {
        let mut window = FrameWindow::new(1, 2, 4).unwrap();
        let frame = Array2::from_shape_vec(
            (2, 4),
            vec![0.25, 0.5, 0.0, 1.0, -1.0, 0.75, 0.75, 0.0],
        )
        .unwrap();
        window.push(EventFrame::from_array(frame.clone())).unwrap();
        let view = window.window(1, 1, 0).unwrap();
        let bank = single_tap_bank(1, 0, 1, 1, 1.0);

        let plain = ResponseEngine::with_defaults().respond(&view, &bank).unwrap();
        assert_eq!(plain.index_axis(Axis(0), 0), frame);

        let engine = ResponseEngine::new(ResponseConfig {
            tile_suppression: true,
            tile_size: 2,
        })
        .unwrap();
        let out = engine.respond(&view, &bank).unwrap();
        assert_eq!(
            out.index_axis(Axis(0), 0),
            Array2::from_shape_vec((2, 4), vec![0.0, 0.5, 0.0, 1.0, 0.0, 0.75, 0.75, 0.0])
                .unwrap()
        );
    }

    #[test]
    fn test_engine_rejects_zero_tile_size() {
        let config = ResponseConfig {
            tile_suppression: true,
            tile_size: 0,
        };
        assert!(matches!(
            ResponseEngine::new(config),
            Err(SignalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_tile_suppression_clips_at_border() {
        let mut map = Array2::from_shape_vec((1, 5), vec![1.0, 2.0, 3.0, 9.0, 7.0]).unwrap();
        suppress_tiles(map.view_mut(), 3);
        assert_eq!(
            map,
            Array2::from_shape_vec((1, 5), vec![0.0, 0.0, 3.0, 9.0, 0.0]).unwrap()
        );
    }

    #[test]
    fn test_activation_is_clamped_channel_max() {
        let mut channels = Array3::zeros((2, 1, 3));
        channels[[0, 0, 0]] = -2.0;
        channels[[1, 0, 0]] = -1.0;
        channels[[0, 0, 1]] = 4.0;
        channels[[1, 0, 2]] = 6.0;
        let maps = ResponseMaps::new(channels);
        let act = maps.activation();
        assert_eq!(act.view().to_owned(), Array2::from_shape_vec((1, 3), vec![0.0, 4.0, 6.0]).unwrap());
        assert_abs_diff_eq!(act.peak(), 6.0);
        // channels themselves keep their sign
        assert_abs_diff_eq!(maps.channel(0)[[0, 0]], -2.0);
    }

    #[test]
    fn test_concat_stacks_channels() {
        let a = Array3::<f32>::zeros((2, 3, 3));
        let b = Array3::<f32>::ones((1, 3, 3));
        let maps = ResponseMaps::concat(vec![a, b]).unwrap();
        assert_eq!(maps.num_channels(), 3);
        assert_abs_diff_eq!(maps.channel(2)[[1, 1]], 1.0);
        assert!(ResponseMaps::concat(vec![Array3::zeros((1, 2, 2)), Array3::zeros((1, 3, 3))]).is_err());
    }
}
