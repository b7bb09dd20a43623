// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types passed between core components and Kegnet peers.
//!
//! Serializes as `{"event": "<Name>", "data": {...fields}}`, which is also the
//! Kegnet wire shape. Variants without fields still carry an empty `data`
//! object so satellites that always send one decode cleanly.

use serde::{Deserialize, Serialize};

/// Lifecycle state reported in a [`Event::FlowUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Initial,
    Active,
    Idle,
    Completed,
}

crate::simple_display! {
    FlowState {
        Initial => "initial",
        Active => "active",
        Idle => "idle",
        Completed => "completed",
    }
}

/// Whether an auth token appeared on or left a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Added,
    Removed,
}

crate::simple_display! {
    TokenState {
        Added => "added",
        Removed => "removed",
    }
}

/// Action carried by a [`Event::FlowRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    StartFlow,
    StopFlow,
}

crate::simple_display! {
    FlowAction {
        StartFlow => "start_flow",
        StopFlow => "stop_flow",
    }
}

/// Requested relay position for a [`Event::SetRelayOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    Enabled,
    Disabled,
}

crate::simple_display! {
    RelayMode {
        Enabled => "enabled",
        Disabled => "disabled",
    }
}

/// Events published on the hub and exchanged with Kegnet peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    #[serde(rename = "Ping")]
    Ping {},

    /// Reserved kind: dispatching it shuts the core down.
    #[serde(rename = "QuitEvent")]
    Quit {},

    #[serde(rename = "StartCompleteEvent")]
    StartComplete {},

    /// Raw odometer-style reading for a meter.
    #[serde(rename = "MeterUpdate")]
    MeterUpdate { tap_name: String, reading: u64 },

    #[serde(rename = "FlowUpdate")]
    FlowUpdate {
        flow_id: u64,
        tap_name: String,
        state: FlowState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        start_time_ms: u64,
        last_activity_time_ms: u64,
        ticks: u64,
    },

    #[serde(rename = "TapIdleEvent")]
    TapIdle { tap_name: String },

    #[serde(rename = "DrinkCreatedEvent")]
    DrinkCreated {
        flow_id: u64,
        drink_id: u64,
        tap_name: String,
        start_time_ms: u64,
        end_time_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    #[serde(rename = "TokenAuthEvent")]
    TokenAuth {
        tap_name: String,
        auth_device_name: String,
        token_value: String,
        status: TokenState,
    },

    #[serde(rename = "ThermoEvent")]
    ThermoUpdate { sensor_name: String, sensor_value: f64 },

    #[serde(rename = "FlowRequest")]
    FlowRequest { tap_name: String, request: FlowAction },

    #[serde(rename = "HeartbeatSecondEvent")]
    HeartbeatSecond {},

    #[serde(rename = "HeartbeatMinuteEvent")]
    HeartbeatMinute {},

    #[serde(rename = "SetRelayOutputEvent")]
    SetRelayOutput { output_name: String, output_mode: RelayMode },

    #[serde(rename = "CreditAddedEvent")]
    CreditAdded { amount: f64, username: String },
}

/// Fieldless mirror of [`Event`], used as the handler registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Ping,
    Quit,
    StartComplete,
    MeterUpdate,
    FlowUpdate,
    TapIdle,
    DrinkCreated,
    TokenAuth,
    ThermoUpdate,
    FlowRequest,
    HeartbeatSecond,
    HeartbeatMinute,
    SetRelayOutput,
    CreditAdded,
}

impl Event {
    pub fn quit() -> Self {
        Event::Quit {}
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ping {} => EventKind::Ping,
            Event::Quit {} => EventKind::Quit,
            Event::StartComplete {} => EventKind::StartComplete,
            Event::MeterUpdate { .. } => EventKind::MeterUpdate,
            Event::FlowUpdate { .. } => EventKind::FlowUpdate,
            Event::TapIdle { .. } => EventKind::TapIdle,
            Event::DrinkCreated { .. } => EventKind::DrinkCreated,
            Event::TokenAuth { .. } => EventKind::TokenAuth,
            Event::ThermoUpdate { .. } => EventKind::ThermoUpdate,
            Event::FlowRequest { .. } => EventKind::FlowRequest,
            Event::HeartbeatSecond {} => EventKind::HeartbeatSecond,
            Event::HeartbeatMinute {} => EventKind::HeartbeatMinute,
            Event::SetRelayOutput { .. } => EventKind::SetRelayOutput,
            Event::CreditAdded { .. } => EventKind::CreditAdded,
        }
    }

    /// Wire name, as found in the `event` field.
    pub fn name(&self) -> &'static str {
        self.kind().wire_name()
    }

    /// Tap the event concerns, if any.
    pub fn tap_name(&self) -> Option<&str> {
        match self {
            Event::MeterUpdate { tap_name, .. }
            | Event::FlowUpdate { tap_name, .. }
            | Event::TapIdle { tap_name }
            | Event::DrinkCreated { tap_name, .. }
            | Event::TokenAuth { tap_name, .. }
            | Event::FlowRequest { tap_name, .. } => Some(tap_name),
            _ => None,
        }
    }

    /// One-line summary for logs.
    pub fn log_summary(&self) -> String {
        match self {
            Event::MeterUpdate { tap_name, reading } => {
                format!("{} tap={tap_name} reading={reading}", self.name())
            }
            Event::FlowUpdate { flow_id, tap_name, state, ticks, .. } => {
                format!("{} flow=0x{flow_id:08x} tap={tap_name} state={state} ticks={ticks}", self.name())
            }
            Event::DrinkCreated { drink_id, tap_name, .. } => {
                format!("{} drink={drink_id} tap={tap_name}", self.name())
            }
            Event::TokenAuth { tap_name, auth_device_name, token_value, status } => format!(
                "{} {auth_device_name}={token_value}@{tap_name} {status}",
                self.name()
            ),
            Event::ThermoUpdate { sensor_name, sensor_value } => {
                format!("{} sensor={sensor_name} value={sensor_value}", self.name())
            }
            Event::FlowRequest { tap_name, request } => {
                format!("{} tap={tap_name} request={request}", self.name())
            }
            Event::SetRelayOutput { output_name, output_mode } => {
                format!("{} output={output_name} mode={output_mode}", self.name())
            }
            _ => self.name().to_string(),
        }
    }
}

impl EventKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::Ping => "Ping",
            EventKind::Quit => "QuitEvent",
            EventKind::StartComplete => "StartCompleteEvent",
            EventKind::MeterUpdate => "MeterUpdate",
            EventKind::FlowUpdate => "FlowUpdate",
            EventKind::TapIdle => "TapIdleEvent",
            EventKind::DrinkCreated => "DrinkCreatedEvent",
            EventKind::TokenAuth => "TokenAuthEvent",
            EventKind::ThermoUpdate => "ThermoEvent",
            EventKind::FlowRequest => "FlowRequest",
            EventKind::HeartbeatSecond => "HeartbeatSecondEvent",
            EventKind::HeartbeatMinute => "HeartbeatMinuteEvent",
            EventKind::SetRelayOutput => "SetRelayOutputEvent",
            EventKind::CreditAdded => "CreditAddedEvent",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
