// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tap registry and per-tap flow lifecycle.
//!
//! Every operation returns the events it produced instead of publishing
//! them, so the owner decides where they go.

use crate::clock::Clock;
use crate::event::{Event, FlowAction, FlowState, RelayMode};
use crate::flow::{Flow, FLOW_IDLE_TIMEOUT};
use crate::meter::{FlowMeter, MeterReading};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("tap already registered: {0}")]
    AlreadyRegistered(String),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("meter delta on {tap} out of range: {delta} > {max}")]
    DeltaOutOfRange { tap: String, delta: u64, max: u64 },
}

/// A pour point bound to a named meter and an optional relay.
#[derive(Debug, Clone)]
pub struct Tap {
    pub name: String,
    pub relay_name: Option<String>,
    pub meter: FlowMeter,
    pub flow: Option<Flow>,
}

impl Tap {
    fn relay_event(&self, mode: RelayMode) -> Option<Event> {
        self.relay_name
            .as_ref()
            .map(|relay| Event::SetRelayOutput { output_name: relay.clone(), output_mode: mode })
    }
}

pub struct TapManager<C: Clock> {
    taps: BTreeMap<String, Tap>,
    clock: C,
    next_flow_id: u64,
    idle_timeout: Duration,
}

impl<C: Clock> TapManager<C> {
    pub fn new(clock: C) -> Self {
        let next_flow_id = clock.epoch_ms() / 1000;
        Self { taps: BTreeMap::new(), clock, next_flow_id, idle_timeout: FLOW_IDLE_TIMEOUT }
    }

    /// Idle timeout given to flows started without an explicit one.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn register_tap(
        &mut self,
        name: &str,
        relay_name: Option<String>,
        max_delta: u64,
    ) -> Result<(), FlowError> {
        if self.taps.contains_key(name) {
            return Err(FlowError::AlreadyRegistered(name.to_string()));
        }
        tracing::info!(tap = %name, relay = ?relay_name, max_delta, "registered tap");
        self.taps.insert(
            name.to_string(),
            Tap {
                name: name.to_string(),
                relay_name,
                meter: FlowMeter::new(name, max_delta),
                flow: None,
            },
        );
        Ok(())
    }

    pub fn unregister_tap(&mut self, name: &str) -> Result<Tap, FlowError> {
        self.taps.remove(name).ok_or_else(|| FlowError::UnknownDevice(name.to_string()))
    }

    pub fn tap_exists(&self, name: &str) -> bool {
        self.taps.contains_key(name)
    }

    pub fn tap(&self, name: &str) -> Result<&Tap, FlowError> {
        self.taps.get(name).ok_or_else(|| FlowError::UnknownDevice(name.to_string()))
    }

    fn tap_mut(&mut self, name: &str) -> Result<&mut Tap, FlowError> {
        self.taps.get_mut(name).ok_or_else(|| FlowError::UnknownDevice(name.to_string()))
    }

    pub fn taps(&self) -> impl Iterator<Item = &Tap> {
        self.taps.values()
    }

    pub fn tap_names(&self) -> Vec<String> {
        self.taps.keys().cloned().collect()
    }

    pub fn flow(&self, tap_name: &str) -> Result<Option<&Flow>, FlowError> {
        Ok(self.tap(tap_name)?.flow.as_ref())
    }

    pub fn active_flows(&self) -> impl Iterator<Item = &Flow> {
        self.taps.values().filter_map(|tap| tap.flow.as_ref())
    }

    /// Feed a raw reading to a tap's meter and return the accepted delta.
    ///
    /// A rejected delta is an error, but the meter still keeps the raw
    /// reading as its new reference.
    pub fn update_device_reading(&mut self, tap_name: &str, reading: u64) -> Result<u64, FlowError> {
        let now = self.clock.epoch_ms();
        let tap = self.tap_mut(tap_name)?;
        match tap.meter.set_ticks(reading, now) {
            MeterReading::Baseline | MeterReading::Unchanged => Ok(0),
            MeterReading::Delta(delta) => Ok(delta),
            MeterReading::Rejected { delta } => Err(FlowError::DeltaOutOfRange {
                tap: tap_name.to_string(),
                delta,
                max: tap.meter.max_delta(),
            }),
        }
    }

    /// Start, take over, replace or refresh the flow on a tap.
    ///
    /// A tap never holds more than one flow. An anonymous flow is adopted
    /// by the first user to authenticate; a flow owned by someone else is
    /// completed and replaced.
    pub fn start_flow(
        &mut self,
        tap_name: &str,
        username: Option<&str>,
        max_idle: Duration,
    ) -> Result<Vec<Event>, FlowError> {
        let mut events = Vec::new();
        let replace = {
            let tap = self.tap_mut(tap_name)?;
            match (tap.flow.as_mut(), username) {
                (Some(flow), Some(user)) if flow.username.as_deref() != Some(user) => {
                    if flow.username.is_none() {
                        tracing::info!(tap = %tap_name, user, flow_id = flow.id, "user taking over flow");
                        flow.username = Some(user.to_string());
                        false
                    } else {
                        tracing::info!(tap = %tap_name, user, flow_id = flow.id, "user replacing flow");
                        true
                    }
                }
                _ => false,
            }
        };
        if replace {
            events.extend(self.complete_flow(tap_name, false)?);
        }

        let flow_id = self.next_flow_id;
        let now = self.clock.epoch_ms();
        let tap = self.tap_mut(tap_name)?;
        match tap.flow.as_mut() {
            Some(flow) => {
                if username.is_some() {
                    flow.max_idle = max_idle;
                }
                events.push(flow.update_event());
            }
            None => {
                let flow =
                    Flow::new(flow_id, tap_name, username.map(str::to_string), max_idle, now);
                tracing::info!(tap = %tap_name, flow_id, user = ?username, "started flow");
                events.push(flow.update_event());
                tap.flow = Some(flow);
                self.next_flow_id += 1;
            }
        }

        if username.is_some() {
            let tap = self.tap(tap_name)?;
            events.extend(tap.relay_event(RelayMode::Enabled));
        }
        Ok(events)
    }

    /// Complete and detach the tap's flow, disabling its relay.
    pub fn stop_flow(&mut self, tap_name: &str) -> Result<Vec<Event>, FlowError> {
        self.complete_flow(tap_name, true)
    }

    fn complete_flow(&mut self, tap_name: &str, disable_relay: bool) -> Result<Vec<Event>, FlowError> {
        let tap = self.tap_mut(tap_name)?;
        let Some(mut flow) = tap.flow.take() else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        if disable_relay {
            events.extend(tap.relay_event(RelayMode::Disabled));
        }
        flow.state = FlowState::Completed;
        tracing::info!(tap = %tap_name, flow_id = flow.id, ticks = flow.ticks, "completed flow");
        events.push(flow.update_event());
        Ok(events)
    }

    /// Apply a meter reading, starting an anonymous flow on the first
    /// positive delta.
    pub fn update_flow(&mut self, tap_name: &str, reading: u64) -> Result<Vec<Event>, FlowError> {
        let delta = self.update_device_reading(tap_name, reading)?;
        if delta == 0 {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        if self.tap(tap_name)?.flow.is_none() {
            let idle_timeout = self.idle_timeout;
            events.extend(self.start_flow(tap_name, None, idle_timeout)?);
        }

        let now = self.clock.epoch_ms();
        let tap = self.tap_mut(tap_name)?;
        if let Some(flow) = tap.flow.as_mut() {
            flow.add_ticks(delta, now);
            if flow.state != FlowState::Active {
                flow.state = FlowState::Active;
                tracing::debug!(tap = %tap_name, flow_id = flow.id, "flow active");
            }
            events.push(flow.update_event());
        }
        Ok(events)
    }

    /// Periodic service: complete idle flows and re-assert relays held by
    /// authenticated flows.
    pub fn service_idle_flows(&mut self) -> Vec<Event> {
        let now = self.clock.epoch_ms();
        let mut events = Vec::new();
        let mut idle = Vec::new();

        for tap in self.taps.values_mut() {
            let Some(flow) = tap.flow.as_mut() else { continue };
            if flow.is_idle(now) {
                tracing::info!(tap = %tap.name, flow_id = flow.id, "flow idle");
                flow.state = FlowState::Idle;
                events.push(flow.update_event());
                events.push(Event::TapIdle { tap_name: tap.name.clone() });
                idle.push(tap.name.clone());
            } else if flow.is_authenticated() {
                events.extend(tap.relay_event(RelayMode::Enabled));
            }
        }

        for tap_name in idle {
            match self.stop_flow(&tap_name) {
                Ok(stopped) => events.extend(stopped),
                Err(e) => tracing::warn!(tap = %tap_name, error = %e, "failed to stop idle flow"),
            }
        }
        events
    }

    pub fn handle_flow_request(
        &mut self,
        tap_name: &str,
        request: FlowAction,
    ) -> Result<Vec<Event>, FlowError> {
        match request {
            FlowAction::StartFlow => {
                let idle_timeout = self.idle_timeout;
                self.start_flow(tap_name, None, idle_timeout)
            }
            FlowAction::StopFlow => self.stop_flow(tap_name),
        }
    }
}

#[cfg(test)]
#[path = "tap_tests.rs"]
mod tests;
