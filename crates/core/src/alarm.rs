// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot alarms ordered by fire time.
//!
//! Any thread may add alarms; a single consumer blocks in
//! [`AlarmManager::wait_for_next_alarm`] and is woken as soon as an earlier
//! alarm is inserted.

use parking_lot::{Condvar, Mutex};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Stand-in fire time for delays too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + delay`, saturated to [`FAR_FUTURE`] when the sum overflows.
fn fire_time(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).or_else(|| now.checked_add(FAR_FUTURE)).unwrap_or(now)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("no pending alarm named {0}")]
    UnknownAlarm(String),
}

/// A fired alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm<T> {
    pub name: String,
    pub fire_at: Instant,
    pub payload: T,
}

struct Entry<T> {
    fire_at: Instant,
    seq: u64,
    name: String,
    payload: T,
}

impl<T> Entry<T> {
    fn key(&self) -> (Instant, u64) {
        (self.fire_at, self.seq)
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

struct Schedule<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
    wakeups: u64,
}

impl<T> Schedule<T> {
    fn push(&mut self, name: String, fire_at: Instant, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { fire_at, seq, name, payload }));
    }
}

/// Min-heap of alarms; ties on fire time fire in insertion order.
pub struct AlarmManager<T> {
    schedule: Mutex<Schedule<T>>,
    wake: Condvar,
}

impl<T> Default for AlarmManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AlarmManager<T> {
    pub fn new() -> Self {
        Self {
            schedule: Mutex::new(Schedule { heap: BinaryHeap::new(), next_seq: 0, wakeups: 0 }),
            wake: Condvar::new(),
        }
    }

    /// Schedule `payload` to fire `expires_in` from now. Returns the fire time.
    pub fn add_alarm(&self, name: impl Into<String>, expires_in: Duration, payload: T) -> Instant {
        let fire_at = fire_time(Instant::now(), expires_in);
        let name = name.into();
        tracing::trace!(alarm = %name, ?expires_in, "alarm added");
        self.schedule.lock().push(name, fire_at, payload);
        self.wake.notify_all();
        fire_at
    }

    /// Block until the earliest alarm is due and return it, or return `None`
    /// once `timeout` elapses or [`wake`](Self::wake) is called with no
    /// alarm due. A `None` timeout, or one too large to represent, waits
    /// indefinitely.
    pub fn wait_for_next_alarm(&self, timeout: Option<Duration>) -> Option<Alarm<T>> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut schedule = self.schedule.lock();
        let wakeups = schedule.wakeups;
        loop {
            let now = Instant::now();
            let next_fire = schedule.heap.peek().map(|Reverse(entry)| entry.fire_at);
            if next_fire.is_some_and(|at| at <= now) {
                let Reverse(entry) = schedule.heap.pop()?;
                return Some(Alarm { name: entry.name, fire_at: entry.fire_at, payload: entry.payload });
            }
            if deadline.is_some_and(|at| at <= now) || schedule.wakeups != wakeups {
                return None;
            }

            let wake_at = match (next_fire, deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            match wake_at {
                Some(at) => {
                    self.wake.wait_until(&mut schedule, at);
                }
                None => self.wake.wait(&mut schedule),
            }
        }
    }

    /// Remove every pending alarm named `name`; returns how many were removed.
    pub fn cancel_alarm(&self, name: &str) -> usize {
        let mut schedule = self.schedule.lock();
        let before = schedule.heap.len();
        schedule.heap.retain(|Reverse(entry)| entry.name != name);
        let removed = before - schedule.heap.len();
        drop(schedule);
        if removed > 0 {
            self.wake.notify_all();
        }
        removed
    }

    /// Reschedule every pending alarm named `name` to fire `expires_in` from now.
    pub fn update_alarm(&self, name: &str, expires_in: Duration) -> Result<(), AlarmError> {
        let fire_at = fire_time(Instant::now(), expires_in);
        let mut schedule = self.schedule.lock();
        let (matching, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut schedule.heap).into_iter().partition(|Reverse(e)| e.name == name);
        schedule.heap = rest.into_iter().collect();
        if matching.is_empty() {
            return Err(AlarmError::UnknownAlarm(name.to_string()));
        }
        for Reverse(entry) in matching {
            schedule.push(entry.name, fire_at, entry.payload);
        }
        drop(schedule);
        self.wake.notify_all();
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.schedule.lock().heap.len()
    }

    pub fn next_fire_time(&self) -> Option<Instant> {
        self.schedule.lock().heap.peek().map(|Reverse(e)| e.fire_at)
    }

    /// Make a blocked waiter return `None` so it can observe shutdown.
    pub fn wake(&self) {
        self.schedule.lock().wakeups += 1;
        self.wake.notify_all();
    }
}

#[cfg(test)]
#[path = "alarm_tests.rs"]
mod tests;
