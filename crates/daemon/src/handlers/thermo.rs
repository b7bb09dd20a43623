// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kb_core::{Backend, Clock, Event, EventKind, SensorReading};

use crate::config::ThermoConfig;
use crate::hub::EventHandler;

#[derive(Debug, Clone, Copy)]
struct SensorState {
    last_seen_ms: u64,
    last_logged_minute_ms: Option<u64>,
}

/// Logs temperature readings, at most one per sensor per wall-clock minute.
pub struct ThermoRecorder<C: Clock> {
    backend: Arc<dyn Backend>,
    clock: C,
    min_celsius: f64,
    max_celsius: f64,
    expire_after: Duration,
    sensors: HashMap<String, SensorState>,
}

impl<C: Clock> ThermoRecorder<C> {
    pub fn new(backend: Arc<dyn Backend>, clock: C, config: &ThermoConfig) -> Self {
        Self {
            backend,
            clock,
            min_celsius: config.min_celsius,
            max_celsius: config.max_celsius,
            expire_after: Duration::from_secs(config.expire_secs),
            sensors: HashMap::new(),
        }
    }

    /// Sensors heard from recently enough to still be tracked.
    pub fn live_sensors(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn record(&mut self, sensor_name: &str, value: f64) -> Vec<Event> {
        if !(self.min_celsius..=self.max_celsius).contains(&value) {
            tracing::debug!(sensor = sensor_name, value, "temperature out of range, dropping");
            return Vec::new();
        }

        let now = self.clock.epoch_ms();
        let minute = self.clock.minute_floor_ms();
        if !self.sensors.contains_key(sensor_name) {
            tracing::info!(sensor = sensor_name, value, "recording temperature sensor");
        }
        let state = self
            .sensors
            .entry(sensor_name.to_string())
            .or_insert(SensorState { last_seen_ms: now, last_logged_minute_ms: None });
        state.last_seen_ms = now;
        if state.last_logged_minute_ms == Some(minute) {
            tracing::trace!(sensor = sensor_name, "already logged this minute");
            return Vec::new();
        }

        let reading = SensorReading { sensor_name: sensor_name.to_string(), value, when_ms: minute };
        match self.backend.log_sensor_reading(&reading) {
            Ok(()) => {
                state.last_logged_minute_ms = Some(minute);
                tracing::debug!(sensor = sensor_name, value, "logged temperature");
                Vec::new()
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, sensor = sensor_name, "backend failed logging temperature");
                vec![Event::quit()]
            }
            Err(e) => {
                tracing::debug!(error = %e, sensor = sensor_name, "temperature rejected by backend");
                Vec::new()
            }
        }
    }

    fn expire(&mut self) {
        let now = self.clock.epoch_ms();
        let max_age = self.expire_after.as_millis() as u64;
        self.sensors.retain(|name, state| {
            let live = now.saturating_sub(state.last_seen_ms) <= max_age;
            if !live {
                tracing::warn!(sensor = %name, "stopped receiving updates for temperature sensor");
            }
            live
        });
    }
}

impl<C: Clock> EventHandler for ThermoRecorder<C> {
    fn name(&self) -> &'static str {
        "thermo"
    }

    fn kinds(&self) -> &[EventKind] {
        &[EventKind::ThermoUpdate, EventKind::HeartbeatMinute]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        match event {
            Event::ThermoUpdate { sensor_name, sensor_value } => self.record(sensor_name, *sensor_value),
            Event::HeartbeatMinute {} => {
                self.expire();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
#[path = "thermo_tests.rs"]
mod tests;
