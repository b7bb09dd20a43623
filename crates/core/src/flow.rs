// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single pour session on a tap.

use crate::event::{Event, FlowState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inactivity after which an anonymous flow is completed.
pub const FLOW_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: u64,
    pub tap_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub max_idle: Duration,
    pub state: FlowState,
    pub start_ms: u64,
    pub last_activity_ms: u64,
    pub ticks: u64,
}

impl Flow {
    pub fn new(
        id: u64,
        tap_name: impl Into<String>,
        username: Option<String>,
        max_idle: Duration,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            tap_name: tap_name.into(),
            username,
            max_idle,
            state: FlowState::Initial,
            start_ms: now_ms,
            last_activity_ms: now_ms,
            ticks: 0,
        }
    }

    pub fn add_ticks(&mut self, amount: u64, when_ms: u64) {
        self.ticks = self.ticks.saturating_add(amount);
        self.last_activity_ms = when_ms;
    }

    pub fn idle_time(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.last_activity_ms))
    }

    pub fn is_idle(&self, now_ms: u64) -> bool {
        self.idle_time(now_ms) >= self.max_idle
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// Snapshot of this flow as a `FlowUpdate` event.
    pub fn update_event(&self) -> Event {
        Event::FlowUpdate {
            flow_id: self.id,
            tap_name: self.tap_name.clone(),
            state: self.state,
            username: self.username.clone(),
            start_time_ms: self.start_ms,
            last_activity_time_ms: self.last_activity_ms,
            ticks: self.ticks,
        }
    }
}
