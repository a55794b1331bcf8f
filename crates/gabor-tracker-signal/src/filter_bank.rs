//! Spatio-temporal filter banks.
//!
//! A bank is an ordered set of kernels shaped `(temporal_depth, height, width)`.
//! Kernels are stored normalized and flipped along all three axes so that the
//! response engine's correlation is a true convolution with the raw filters.
//! The flip is applied once, when the bank is built from raw tensors.

use ndarray::{s, Array3, ArrayView3};

use crate::{Result, SignalError};

/// Default dynamic range raw filters are scaled to (6-bit signed range).
pub const DEFAULT_DYNAMIC_RANGE: f32 = 31.0;

/// Immutable collection of equally shaped, prepared kernels.
#[derive(Debug, Clone)]
pub struct FilterBank {
    kernels: Vec<Array3<f32>>,
    shape: (usize, usize, usize),
}

impl FilterBank {
    /// Build a bank from raw filters: scale every kernel by
    /// `dynamic_range / max` (max taken over the whole bank) and flip each
    /// kernel along time, rows and columns.
    pub fn from_raw(kernels: Vec<Array3<f32>>, dynamic_range: f32) -> Result<Self> {
        let shape = Self::common_shape(&kernels)?;

        if !(dynamic_range.is_finite() && dynamic_range > 0.0) {
            return Err(SignalError::InvalidFilterBank(format!(
                "dynamic range must be positive, got {}",
                dynamic_range
            )));
        }

        let global_max = kernels
            .iter()
            .flat_map(|k| k.iter().copied())
            .fold(f32::NEG_INFINITY, f32::max);
        if !(global_max.is_finite() && global_max > 0.0) {
            return Err(SignalError::InvalidFilterBank(format!(
                "cannot normalize bank with maximum {}",
                global_max
            )));
        }

        let scale = dynamic_range / global_max;
        let kernels = kernels
            .iter()
            .map(|k| k.slice(s![..;-1, ..;-1, ..;-1]).mapv(|v| v * scale))
            .collect();

        tracing::debug!(
            filters = shape.0,
            scale,
            "Filter bank normalized and flipped"
        );

        Ok(Self {
            kernels,
            shape: (shape.1, shape.2, shape.3),
        })
    }

    /// Wrap kernels that were already normalized and flipped by the loader.
    pub fn from_prepared(kernels: Vec<Array3<f32>>) -> Result<Self> {
        let shape = Self::common_shape(&kernels)?;
        Ok(Self {
            kernels,
            shape: (shape.1, shape.2, shape.3),
        })
    }

    /// Returns `(count, depth, height, width)` after checking every kernel.
    fn common_shape(kernels: &[Array3<f32>]) -> Result<(usize, usize, usize, usize)> {
        let first = kernels
            .first()
            .ok_or_else(|| SignalError::InvalidFilterBank("bank has no kernels".into()))?;
        let dim = first.dim();
        if dim.0 == 0 || dim.1 == 0 || dim.2 == 0 {
            return Err(SignalError::InvalidFilterBank(format!(
                "kernel dimensions must be positive, got {:?}",
                dim
            )));
        }

        if let Some(bad) = kernels.iter().find(|k| k.dim() != dim) {
            return Err(SignalError::ShapeMismatch {
                expected: vec![dim.0, dim.1, dim.2],
                actual: bad.shape().to_vec(),
            });
        }

        Ok((kernels.len(), dim.0, dim.1, dim.2))
    }

    /// Number of kernels
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Always `false`; construction rejects empty banks.
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Number of frames each kernel spans.
    pub fn temporal_depth(&self) -> usize {
        self.shape.0
    }

    /// Spatial kernel size as `(height, width)`.
    pub fn spatial_dim(&self) -> (usize, usize) {
        (self.shape.1, self.shape.2)
    }

    /// Prepared kernel `index`.
    pub fn kernel(&self, index: usize) -> Option<ArrayView3<'_, f32>> {
        self.kernels.get(index).map(|k| k.view())
    }

    /// Iterate over prepared kernels in bank order.
    pub fn iter(&self) -> impl Iterator<Item = ArrayView3<'_, f32>> {
        self.kernels.iter().map(|k| k.view())
    }
}
