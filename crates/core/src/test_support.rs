// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::backend::{AuthToken, MemoryBackend, TapRecord};
use crate::event::{Event, FlowAction, TokenState};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for events as they appear on the wire.
pub mod strategies {
    use crate::event::{Event, FlowAction, FlowState, RelayMode, TokenState};
    use proptest::prelude::*;

    pub fn arb_flow_state() -> impl Strategy<Value = FlowState> {
        prop_oneof![
            Just(FlowState::Initial),
            Just(FlowState::Active),
            Just(FlowState::Idle),
            Just(FlowState::Completed),
        ]
    }

    fn arb_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_.]{0,15}"
    }

    /// Events with finite float fields, so JSON round-trips exactly.
    pub fn arb_event() -> impl Strategy<Value = Event> {
        prop_oneof![
            Just(Event::Ping {}),
            Just(Event::HeartbeatSecond {}),
            (arb_name(), any::<u64>())
                .prop_map(|(tap_name, reading)| Event::MeterUpdate { tap_name, reading }),
            (
                any::<u64>(),
                arb_name(),
                arb_flow_state(),
                proptest::option::of(arb_name()),
                any::<u64>(),
                any::<u64>(),
                any::<u64>()
            )
                .prop_map(|(flow_id, tap_name, state, username, start, last, ticks)| {
                    Event::FlowUpdate {
                        flow_id,
                        tap_name,
                        state,
                        username,
                        start_time_ms: start,
                        last_activity_time_ms: last,
                        ticks,
                    }
                }),
            (arb_name(), arb_name(), "[0-9a-f]{2,16}", any::<bool>()).prop_map(
                |(tap_name, auth_device_name, token_value, added)| Event::TokenAuth {
                    tap_name,
                    auth_device_name,
                    token_value,
                    status: if added { TokenState::Added } else { TokenState::Removed },
                }
            ),
            (arb_name(), -40_000i32..120_000).prop_map(|(sensor_name, milli)| {
                Event::ThermoUpdate { sensor_name, sensor_value: f64::from(milli) / 1000.0 }
            }),
            (arb_name(), any::<bool>()).prop_map(|(tap_name, start)| Event::FlowRequest {
                tap_name,
                request: if start { FlowAction::StartFlow } else { FlowAction::StopFlow },
            }),
            (arb_name(), any::<bool>()).prop_map(|(output_name, on)| Event::SetRelayOutput {
                output_name,
                output_mode: if on { RelayMode::Enabled } else { RelayMode::Disabled },
            }),
        ]
    }
}

// ── Event factory functions ─────────────────────────────────────────────────

pub fn meter_update_event(tap_name: &str, reading: u64) -> Event {
    Event::MeterUpdate { tap_name: tap_name.to_string(), reading }
}

pub fn flow_request_event(tap_name: &str, request: FlowAction) -> Event {
    Event::FlowRequest { tap_name: tap_name.to_string(), request }
}

pub fn token_event(tap_name: &str, device: &str, value: &str, status: TokenState) -> Event {
    Event::TokenAuth {
        tap_name: tap_name.to_string(),
        auth_device_name: device.to_string(),
        token_value: value.to_string(),
        status,
    }
}

pub fn thermo_event(sensor_name: &str, value: f64) -> Event {
    Event::ThermoUpdate { sensor_name: sensor_name.to_string(), sensor_value: value }
}

// ── Backend fixtures ────────────────────────────────────────────────────

/// Backend with two taps (`kegboard.flow0` relayed, `kegboard.flow1` not)
/// and one onewire token bound to `alice`.
pub fn memory_backend() -> MemoryBackend {
    MemoryBackend::new()
        .with_tap(TapRecord {
            meter_name: "kegboard.flow0".to_string(),
            relay_name: Some("kegboard.relay0".to_string()),
            ml_per_tick: 0.5,
        })
        .with_tap(TapRecord {
            meter_name: "kegboard.flow1".to_string(),
            relay_name: None,
            ml_per_tick: 0.5,
        })
        .with_token(AuthToken {
            auth_device: "core.onewire".to_string(),
            token_value: "0000111122223333".to_string(),
            username: Some("alice".to_string()),
            enabled: true,
        })
}
