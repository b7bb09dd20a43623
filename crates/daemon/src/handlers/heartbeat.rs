// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use kb_core::{AlarmManager, Event, EventKind};

use crate::hub::EventHandler;

pub const HEARTBEAT_SECOND: &str = "heartbeat-second";
pub const HEARTBEAT_MINUTE: &str = "heartbeat-minute";

/// Keeps the second and minute heartbeats ticking: each firing schedules
/// its successor.
pub struct Heartbeat {
    alarms: Arc<AlarmManager<Event>>,
}

impl Heartbeat {
    pub fn new(alarms: Arc<AlarmManager<Event>>) -> Self {
        Self { alarms }
    }

    /// Schedule the first beats, replacing any already pending.
    pub fn start(&self) {
        self.alarms.cancel_alarm(HEARTBEAT_SECOND);
        self.alarms.cancel_alarm(HEARTBEAT_MINUTE);
        self.schedule_second();
        self.schedule_minute();
    }

    fn schedule_second(&self) {
        self.alarms.add_alarm(HEARTBEAT_SECOND, Duration::from_secs(1), Event::HeartbeatSecond {});
    }

    fn schedule_minute(&self) {
        self.alarms.add_alarm(HEARTBEAT_MINUTE, Duration::from_secs(60), Event::HeartbeatMinute {});
    }
}

impl EventHandler for Heartbeat {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn kinds(&self) -> &[EventKind] {
        &[EventKind::HeartbeatSecond, EventKind::HeartbeatMinute]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        match event {
            Event::HeartbeatSecond {} => self.schedule_second(),
            Event::HeartbeatMinute {} => self.schedule_minute(),
            _ => {}
        }
        Vec::new()
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
