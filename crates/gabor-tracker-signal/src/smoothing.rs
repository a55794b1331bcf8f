//! Separable Gaussian smoothing with reflect padding.

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::{Result, SignalError};

/// Square Gaussian blur applied to 2-D maps.
///
/// The 1-D kernel samples `exp(-0.5 (x / sigma)^2)` at `kernel_size` evenly
/// spaced points in `[-(k-1)/2, (k-1)/2]` and is normalized to unit sum.
/// Borders are handled by mirror reflection (edge pixel not repeated).
#[derive(Debug, Clone)]
pub struct GaussianSmoother {
    kernel: Vec<f32>,
    sigma: f32,
}

impl GaussianSmoother {
    /// Create a smoother; `kernel_size` must be odd and positive, `sigma` positive.
    pub fn new(kernel_size: usize, sigma: f32) -> Result<Self> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            return Err(SignalError::InvalidConfig(format!(
                "blur kernel size must be odd and positive, got {}",
                kernel_size
            )));
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(SignalError::InvalidConfig(format!(
                "blur sigma must be positive, got {}",
                sigma
            )));
        }

        let half = (kernel_size - 1) as f32 * 0.5;
        let mut kernel: Vec<f32> = (0..kernel_size)
            .map(|i| {
                let x = i as f32 - half;
                (-0.5 * (x / sigma).powi(2)).exp()
            })
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|v| *v /= sum);

        Ok(Self { kernel, sigma })
    }

    /// 1-D kernel weights
    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    /// Standard deviation
    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Blur `input` into a new array of the same shape.
    pub fn smooth(&self, input: ArrayView2<'_, f32>) -> Array2<f32> {
        let mut out = input.to_owned();
        self.smooth_inplace(out.view_mut());
        out
    }

    /// Blur `map` in place.
    pub fn smooth_inplace(&self, mut map: ArrayViewMut2<'_, f32>) {
        let (height, width) = map.dim();
        if height == 0 || width == 0 {
            return;
        }
        let half = (self.kernel.len() / 2) as isize;

        // Horizontal pass
        let mut row_buf = vec![0.0f32; width];
        for mut row in map.rows_mut() {
            for (x, slot) in row_buf.iter_mut().enumerate() {
                *slot = self
                    .kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * row[reflect(x as isize + k as isize - half, width)])
                    .sum();
            }
            for (dst, src) in row.iter_mut().zip(&row_buf) {
                *dst = *src;
            }
        }

        // Vertical pass
        let mut col_buf = vec![0.0f32; height];
        for mut col in map.columns_mut() {
            for (y, slot) in col_buf.iter_mut().enumerate() {
                *slot = self
                    .kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * col[reflect(y as isize + k as isize - half, height)])
                    .sum();
            }
            for (dst, src) in col.iter_mut().zip(&col_buf) {
                *dst = *src;
            }
        }
    }
}

/// Mirror an out-of-range index back into `[0, len)`.
fn reflect(mut i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let n = len as isize;
    let period = 2 * (n - 1);
    i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}
