// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarm thread: posts each fired alarm's event to the hub.

use std::sync::Arc;
use std::time::Duration;

use kb_core::{AlarmManager, Event};

use crate::hub::Publisher;
use crate::shutdown::Shutdown;

const WAIT_SLICE: Duration = Duration::from_secs(1);

pub fn run(alarms: Arc<AlarmManager<Event>>, publisher: Publisher, shutdown: &Shutdown) {
    {
        let alarms = Arc::clone(&alarms);
        shutdown.on_trigger(move || alarms.wake());
    }

    tracing::info!(pending = alarms.pending(), "alarm thread running");
    while !shutdown.is_triggered() {
        let Some(alarm) = alarms.wait_for_next_alarm(Some(WAIT_SLICE)) else { continue };
        tracing::trace!(alarm = %alarm.name, "alarm fired");
        if !publisher.publish(alarm.payload) {
            break;
        }
    }
    tracing::info!("alarm thread stopped");
}

#[cfg(test)]
#[path = "alarm_tests.rs"]
mod tests;
