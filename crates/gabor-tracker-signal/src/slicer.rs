//! Partitioning of a sorted event stream into fixed-duration ticks.

use crate::event::Event;

/// Iterator over consecutive `dt`-long batches of a timestamp-sorted slice.
///
/// Each batch starts at the first event not yet consumed (`t0`) and holds
/// every following event with `timestamp < t0 + dt`. Gaps in the stream do
/// not produce empty batches.
#[derive(Debug, Clone)]
pub struct TimeSlices<'a> {
    events: &'a [Event],
    dt: i64,
}

impl<'a> TimeSlices<'a> {
    /// Slice `events` into batches of duration `dt`.
    ///
    /// A non-positive `dt` yields one event per batch.
    pub fn new(events: &'a [Event], dt: i64) -> Self {
        Self { events, dt }
    }

    /// Batch duration
    pub fn dt(&self) -> i64 {
        self.dt
    }
}

impl<'a> Iterator for TimeSlices<'a> {
    type Item = &'a [Event];

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.events.first()?;
        let end_ts = first.timestamp.saturating_add(self.dt);
        let len = self
            .events
            .iter()
            .position(|e| e.timestamp >= end_ts)
            .unwrap_or(self.events.len())
            .max(1);

        let (batch, rest) = self.events.split_at(len);
        self.events = rest;
        Some(batch)
    }
}
