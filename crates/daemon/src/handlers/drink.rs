// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use kb_core::{Backend, Event, EventKind, FlowState, PourRequest};

use crate::hub::EventHandler;

/// Records completed flows as pours.
pub struct DrinkRecorder {
    backend: Arc<dyn Backend>,
    min_volume_ml: f64,
}

impl DrinkRecorder {
    pub fn new(backend: Arc<dyn Backend>, min_volume_ml: f64) -> Self {
        Self { backend, min_volume_ml }
    }

    /// Calibrated volume of `ticks` on `tap_name`, if the backend knows the tap.
    fn volume_ml(&self, tap_name: &str, ticks: u64) -> Option<f64> {
        let taps = match self.backend.taps() {
            Ok(taps) => taps,
            Err(e) => {
                tracing::warn!(error = %e, tap = %tap_name, "tap calibration unavailable");
                return None;
            }
        };
        taps.iter().find(|t| t.meter_name == tap_name).map(|t| ticks as f64 * t.ml_per_tick)
    }
}

impl EventHandler for DrinkRecorder {
    fn name(&self) -> &'static str {
        "drink"
    }

    fn kinds(&self) -> &[EventKind] {
        &[EventKind::FlowUpdate]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        let Event::FlowUpdate {
            flow_id,
            tap_name,
            state: FlowState::Completed,
            username,
            start_time_ms,
            last_activity_time_ms,
            ticks,
        } = event
        else {
            return Vec::new();
        };
        if *ticks == 0 {
            tracing::debug!(flow_id, tap = %tap_name, "flow poured nothing, not recording");
            return Vec::new();
        }
        if let Some(volume_ml) = self.volume_ml(tap_name, *ticks) {
            if volume_ml <= self.min_volume_ml {
                tracing::info!(
                    flow_id,
                    tap = %tap_name,
                    volume_ml,
                    min_volume_ml = self.min_volume_ml,
                    "flow below minimum volume, not recording"
                );
                return Vec::new();
            }
        }

        let request = PourRequest {
            tap_name: tap_name.clone(),
            ticks: *ticks,
            username: username.clone(),
            pour_time_ms: *last_activity_time_ms,
            duration: Duration::from_millis(last_activity_time_ms.saturating_sub(*start_time_ms)),
            shout: None,
        };
        match self.backend.record_pour(&request) {
            Ok(record) => {
                tracing::info!(
                    drink_id = record.drink_id,
                    flow_id,
                    tap = %tap_name,
                    volume_ml = record.volume_ml,
                    user = ?username,
                    "recorded drink"
                );
                vec![Event::DrinkCreated {
                    flow_id: *flow_id,
                    drink_id: record.drink_id,
                    tap_name: tap_name.clone(),
                    start_time_ms: *start_time_ms,
                    end_time_ms: *last_activity_time_ms,
                    username: username.clone(),
                }]
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, flow_id, "backend failed recording pour");
                vec![Event::quit()]
            }
            Err(e) => {
                tracing::error!(error = %e, flow_id, tap = %tap_name, "pour not recorded");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[path = "drink_tests.rs"]
mod tests;
