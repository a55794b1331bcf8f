//! Fixed-depth sliding window of event frames.
//!
//! The window always holds exactly `depth` frames, stored newest-first. It is
//! pre-filled with zero frames so downstream stages never see a short window,
//! and every push evicts the oldest frame.

use ndarray::{Array2, ArrayView2};
use std::collections::VecDeque;

use crate::event::EventFrame;
use crate::{Result, SignalError};

/// Ring buffer of the most recent event frames (index 0 = newest).
#[derive(Debug, Clone)]
pub struct FrameWindow {
    frames: VecDeque<Array2<f32>>,
    depth: usize,
    height: usize,
    width: usize,
}

impl FrameWindow {
    /// Create a window of `depth` zero frames of shape `(height, width)`.
    pub fn new(depth: usize, height: usize, width: usize) -> Result<Self> {
        if depth == 0 {
            return Err(SignalError::InvalidConfig(
                "frame window depth must be positive".into(),
            ));
        }
        if height == 0 || width == 0 {
            return Err(SignalError::InvalidConfig(format!(
                "frame dimensions must be positive, got {}x{}",
                height, width
            )));
        }

        let frames = (0..depth)
            .map(|_| Array2::zeros((height, width)))
            .collect::<VecDeque<_>>();

        Ok(Self {
            frames,
            depth,
            height,
            width,
        })
    }

    /// Insert a new frame, evicting the oldest one.
    pub fn push(&mut self, frame: EventFrame) -> Result<()> {
        let (h, w) = frame.dim();
        if (h, w) != (self.height, self.width) {
            return Err(SignalError::ShapeMismatch {
                expected: vec![self.height, self.width],
                actual: vec![h, w],
            });
        }

        self.frames.pop_back();
        self.frames.push_front(frame.into_inner());
        Ok(())
    }

    /// Strided view of `length` frames.
    ///
    /// The first selected frame sits `center_offset` frames from the window
    /// centre (`depth / 2`); subsequent frames follow every `stride` frames
    /// towards older data.
    pub fn window(
        &self,
        stride: usize,
        length: usize,
        center_offset: isize,
    ) -> Result<TemporalWindow<'_>> {
        let out_of_bounds = || SignalError::WindowOutOfBounds {
            stride,
            length,
            center_offset,
            depth: self.depth,
        };

        if stride == 0 || length == 0 {
            return Err(out_of_bounds());
        }

        let start = (self.depth / 2) as isize + center_offset;
        let last = (length - 1)
            .checked_mul(stride)
            .and_then(|span| isize::try_from(span).ok())
            .and_then(|span| start.checked_add(span))
            .ok_or_else(out_of_bounds)?;

        if start < 0 || last >= self.depth as isize {
            return Err(out_of_bounds());
        }

        let frames = (0..length)
            .map(|i| self.frames[start as usize + i * stride].view())
            .collect();

        Ok(TemporalWindow { frames })
    }

    /// View of `length` frames at `stride` centred on the middle frame.
    pub fn centered_window(&self, stride: usize, length: usize) -> Result<TemporalWindow<'_>> {
        let half_span = (length / 2).saturating_mul(stride);
        let offset = isize::try_from(half_span).map_err(|_| SignalError::WindowOutOfBounds {
            stride,
            length,
            center_offset: isize::MIN,
            depth: self.depth,
        })?;
        self.window(stride, length, -offset)
    }

    /// Middle frame of the window.
    pub fn center_frame(&self) -> ArrayView2<'_, f32> {
        self.frames[self.depth / 2].view()
    }

    /// Most recently pushed frame.
    pub fn newest(&self) -> ArrayView2<'_, f32> {
        self.frames[0].view()
    }

    /// Number of frames currently held (always equal to the depth).
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always `false`; a window holds at least one frame.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Configured capacity
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Frame shape as `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Replace every frame with zeros.
    pub fn reset(&mut self) {
        for frame in &mut self.frames {
            frame.fill(0.0);
        }
    }
}

/// Borrowed, ordered selection of frames from a [`FrameWindow`].
#[derive(Debug, Clone)]
pub struct TemporalWindow<'a> {
    frames: Vec<ArrayView2<'a, f32>>,
}

impl<'a> TemporalWindow<'a> {
    /// Number of frames in the view.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the view holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Shape of each frame as `(height, width)`.
    pub fn frame_dim(&self) -> Option<(usize, usize)> {
        self.frames.first().map(|f| f.dim())
    }

    /// Frames in window order.
    pub fn frames(&self) -> &[ArrayView2<'a, f32>] {
        &self.frames
    }
}
