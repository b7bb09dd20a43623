// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn flow_update() -> Event {
    Event::FlowUpdate {
        flow_id: 0x6512_bd43,
        tap_name: "kegboard.flow0".to_string(),
        state: FlowState::Active,
        username: None,
        start_time_ms: 1_000,
        last_activity_time_ms: 2_000,
        ticks: 42,
    }
}

#[test]
fn serializes_with_event_and_data_keys() {
    let value = serde_json::to_value(Event::TapIdle { tap_name: "t".into() }).unwrap();
    assert_eq!(value, json!({"event": "TapIdleEvent", "data": {"tap_name": "t"}}));
}

#[test]
fn fieldless_events_carry_empty_data() {
    let value = serde_json::to_value(Event::HeartbeatSecond {}).unwrap();
    assert_eq!(value, json!({"event": "HeartbeatSecondEvent", "data": {}}));

    let parsed: Event = serde_json::from_value(json!({"event": "Ping", "data": {}})).unwrap();
    assert_eq!(parsed, Event::Ping {});
}

#[test]
fn absent_username_is_omitted() {
    let value = serde_json::to_value(flow_update()).unwrap();
    assert!(value["data"].get("username").is_none());
    assert_eq!(value["data"]["state"], "active");
}

#[test]
fn flow_update_parses_without_username() {
    let parsed: Event = serde_json::from_value(json!({
        "event": "FlowUpdate",
        "data": {
            "flow_id": 1, "tap_name": "t", "state": "completed",
            "start_time_ms": 0, "last_activity_time_ms": 0, "ticks": 7
        }
    }))
    .unwrap();
    assert!(matches!(parsed, Event::FlowUpdate { username: None, state: FlowState::Completed, ticks: 7, .. }));
}

#[test]
fn unknown_event_name_is_rejected() {
    let result = serde_json::from_value::<Event>(json!({"event": "NoSuchEvent", "data": {}}));
    assert!(result.is_err());
}

#[test]
fn name_matches_serialized_tag() {
    let events = vec![
        Event::Ping {},
        Event::quit(),
        Event::StartComplete {},
        Event::MeterUpdate { tap_name: "t".into(), reading: 1 },
        flow_update(),
        Event::TapIdle { tap_name: "t".into() },
        Event::DrinkCreated {
            flow_id: 1,
            drink_id: 2,
            tap_name: "t".into(),
            start_time_ms: 0,
            end_time_ms: 1,
            username: Some("kb".into()),
        },
        Event::TokenAuth {
            tap_name: "t".into(),
            auth_device_name: "core.rfid".into(),
            token_value: "abcd".into(),
            status: TokenState::Added,
        },
        Event::ThermoUpdate { sensor_name: "s".into(), sensor_value: 4.5 },
        Event::FlowRequest { tap_name: "t".into(), request: FlowAction::StopFlow },
        Event::HeartbeatSecond {},
        Event::HeartbeatMinute {},
        Event::SetRelayOutput { output_name: "r".into(), output_mode: RelayMode::Disabled },
        Event::CreditAdded { amount: 1.5, username: "kb".into() },
    ];

    for event in events {
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name(), "tag mismatch for {:?}", event);
        assert_eq!(event.kind().to_string(), event.name());
        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}

#[yare::parameterized(
    meter   = { Event::MeterUpdate { tap_name: "a".into(), reading: 0 }, Some("a") },
    idle    = { Event::TapIdle { tap_name: "b".into() }, Some("b") },
    request = { Event::FlowRequest { tap_name: "c".into(), request: FlowAction::StartFlow }, Some("c") },
    thermo  = { Event::ThermoUpdate { sensor_name: "s".into(), sensor_value: 1.0 }, None },
    ping    = { Event::Ping {}, None },
)]
fn tap_name_extraction(event: Event, expected: Option<&str>) {
    assert_eq!(event.tap_name(), expected);
}

#[test]
fn log_summary_includes_key_fields() {
    let summary = flow_update().log_summary();
    assert!(summary.starts_with("FlowUpdate"));
    assert!(summary.contains("tap=kegboard.flow0"));
    assert!(summary.contains("state=active"));
    assert!(summary.contains("ticks=42"));
    assert_eq!(Event::quit().log_summary(), "QuitEvent");
}

#[yare::parameterized(
    initial   = { FlowState::Initial, "initial" },
    active    = { FlowState::Active, "active" },
    idle      = { FlowState::Idle, "idle" },
    completed = { FlowState::Completed, "completed" },
)]
fn flow_state_display(state: FlowState, expected: &str) {
    assert_eq!(state.to_string(), expected);
}
