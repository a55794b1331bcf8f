//! Running-mean accumulator for stage timing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, SignalError};

/// Running mean of recorded samples.
///
/// Durations are stored in nanoseconds. Asking for the mean before any sample
/// was recorded is an error rather than a NaN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    sum: f64,
    count: u64,
}

impl MovingAverage {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one duration sample.
    pub fn record(&mut self, sample: Duration) {
        self.record_value(sample.as_nanos() as f64);
    }

    /// Record a raw sample and return the updated mean.
    pub fn record_value(&mut self, value: f64) -> f64 {
        self.sum += value;
        self.count += 1;
        self.sum / self.count as f64
    }

    /// Mean of all samples (nanoseconds for duration samples).
    pub fn mean(&self) -> Result<f64> {
        if self.count == 0 {
            return Err(SignalError::NoSamples);
        }
        Ok(self.sum / self.count as f64)
    }

    /// Number of recorded samples
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Discard all samples.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
