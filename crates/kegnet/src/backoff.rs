// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Reconnect delays indexed by consecutive failures, saturating at the last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    schedule: Vec<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_secs(&[5, 5, 10, 10, 20, 20, 60])
    }
}

impl Backoff {
    pub fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// Wait before the next attempt after `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        let Some(last) = self.schedule.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = usize::try_from(failures).map_or(last, |f| f.min(last));
        self.schedule[index]
    }

    pub fn max_delay(&self) -> Duration {
        self.schedule.iter().copied().max().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
