//! Polarity events and per-tick event frames.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::SignalError;

/// Sign of a brightness change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    /// Brightness increase (+1)
    On,
    /// Brightness decrease (-1)
    Off,
}

impl Polarity {
    /// Signed contribution of this polarity to an event frame.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Polarity::On => 1.0,
            Polarity::Off => -1.0,
        }
    }
}

impl TryFrom<i8> for Polarity {
    type Error = SignalError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Polarity::On),
            -1 => Ok(Polarity::Off),
            other => Err(SignalError::InvalidEvent(format!(
                "polarity must be -1 or +1, got {}",
                other
            ))),
        }
    }
}

impl From<Polarity> for i8 {
    fn from(p: Polarity) -> Self {
        match p {
            Polarity::On => 1,
            Polarity::Off => -1,
        }
    }
}

/// Single asynchronous pixel event from an event camera.
///
/// `x` is the sensor column and `y` the sensor row, both 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Timestamp in sensor ticks (typically microseconds)
    pub timestamp: i64,
    /// Column
    pub x: u16,
    /// Row
    pub y: u16,
    /// Sign of the brightness change
    pub polarity: Polarity,
}

impl Event {
    /// Create a new event
    pub fn new(timestamp: i64, x: u16, y: u16, polarity: Polarity) -> Self {
        Self {
            timestamp,
            x,
            y,
            polarity,
        }
    }

    /// Create an event from a raw signed polarity value.
    pub fn from_raw(timestamp: i64, x: u16, y: u16, polarity: i8) -> Result<Self, SignalError> {
        Ok(Self::new(timestamp, x, y, Polarity::try_from(polarity)?))
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.x,
            self.y,
            self.timestamp,
            i8::from(self.polarity)
        )
    }
}

/// Accumulated polarity of one tick, clamped to [-1, +1] per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    data: Array2<f32>,
}

impl EventFrame {
    /// All-zero frame of shape `(height, width)`.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    /// Wrap an existing array, clamping every value into [-1, +1].
    pub fn from_array(mut data: Array2<f32>) -> Self {
        data.mapv_inplace(|v| v.clamp(-1.0, 1.0));
        Self { data }
    }

    /// Sum the polarity of `events` into a `(height, width)` grid and clamp.
    ///
    /// Events outside the grid are ignored; their count is returned next to
    /// the frame.
    pub fn accumulate(events: &[Event], height: usize, width: usize) -> (Self, usize) {
        let mut data = Array2::<f32>::zeros((height, width));
        let mut dropped = 0usize;

        for ev in events {
            let (row, col) = (ev.y as usize, ev.x as usize);
            if row >= height || col >= width {
                dropped += 1;
                continue;
            }
            data[[row, col]] += ev.polarity.sign();
        }

        if dropped > 0 {
            tracing::warn!(dropped, height, width, "Events outside sensor grid ignored");
        }

        (Self::from_array(data), dropped)
    }

    /// Shape as `(height, width)`.
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Borrow the pixel grid.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Consume the frame, returning the pixel grid.
    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    /// Number of pixels with a non-zero value.
    pub fn active_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }
}
