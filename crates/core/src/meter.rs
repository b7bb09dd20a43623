// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Odometer-style tick counter for a single flow meter.

use std::time::Duration;

/// Largest delta accepted between consecutive readings.
pub const MAX_METER_READING_DELTA: u64 = 4400;

/// Outcome of feeding one raw reading into a [`FlowMeter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterReading {
    /// First reading seen; stored without producing ticks.
    Baseline,
    /// Same raw value as before.
    Unchanged,
    /// Ticks added to the running total.
    Delta(u64),
    /// Delta above the meter's limit; only the raw reading was stored.
    Rejected { delta: u64 },
}

/// Tick delta between two raw readings, assuming at most one counter wrap.
///
/// A decrease is treated as a wrap of the narrowest counter width
/// (16, 32 or 64 bits) able to hold `last`.
pub fn reading_delta(last: u64, new: u64) -> u64 {
    if new >= last {
        return new - last;
    }
    let power: u128 = if last < 1 << 16 {
        1 << 16
    } else if last < 1 << 32 {
        1 << 32
    } else {
        1 << 64
    };
    (power - u128::from(last) + u128::from(new)) as u64
}

#[derive(Debug, Clone)]
pub struct FlowMeter {
    name: String,
    max_delta: u64,
    ticks: u64,
    last_reading: Option<u64>,
    last_activity_ms: u64,
}

impl FlowMeter {
    /// A meter that rejects deltas above `max_delta` (0 disables the check).
    pub fn new(name: impl Into<String>, max_delta: u64) -> Self {
        Self { name: name.into(), max_delta, ticks: 0, last_reading: None, last_activity_ms: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_delta(&self) -> u64 {
        self.max_delta
    }

    /// Total ticks accepted since the meter was created.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn last_reading(&self) -> Option<u64> {
        self.last_reading
    }

    /// Time of the last accepted non-zero delta, 0 if there has been none.
    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    /// Record a raw reading taken at `when_ms`.
    pub fn set_ticks(&mut self, reading: u64, when_ms: u64) -> MeterReading {
        let Some(last) = self.last_reading.replace(reading) else {
            return MeterReading::Baseline;
        };

        let delta = reading_delta(last, reading);
        if delta == 0 {
            return MeterReading::Unchanged;
        }
        if self.max_delta > 0 && delta > self.max_delta {
            tracing::warn!(meter = %self.name, last, reading, delta, "meter delta out of range");
            return MeterReading::Rejected { delta };
        }

        self.ticks = self.ticks.saturating_add(delta);
        self.last_activity_ms = when_ms;
        MeterReading::Delta(delta)
    }

    /// Time since the last accepted activity.
    ///
    /// A meter that has never seen activity reports `now_ms` itself.
    pub fn idle_time(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.last_activity_ms))
    }
}

#[cfg(test)]
#[path = "meter_tests.rs"]
mod tests;
