// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hub::EventHub;
use crate::test_helpers::manager;
use kb_core::test_support::{flow_request_event, meter_update_event, token_event};
use kb_core::{FakeClock, FlowAction, FlowState, RelayMode, TokenState};
use kb_kegboard::{MeterStatus, OnewirePresence};
use std::time::Duration;

const TAP: &str = "kegboard.flow0";
const ALICE: &str = "0000111122223333";

fn states(events: &[Event]) -> Vec<FlowState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::FlowUpdate { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

fn meter(reading: u32) -> ManagerInput {
    ManagerInput::Device(Message::MeterStatus(MeterStatus {
        meter_name: "flow0".to_string(),
        meter_reading: reading,
    }))
}

#[test]
fn registers_configured_taps() {
    let (manager, _) = manager(FakeClock::new());
    assert_eq!(manager.taps().tap_names(), vec!["kegboard.flow0", "kegboard.flow1"]);
}

#[test]
fn device_meter_status_drives_flow() {
    let (mut manager, _) = manager(FakeClock::new());

    assert!(manager.handle(meter(100)).is_empty());
    let events = manager.handle(meter(150));
    assert_eq!(states(&events), vec![FlowState::Initial, FlowState::Active]);

    let flow = manager.taps().flow(TAP).unwrap().unwrap();
    assert_eq!(flow.ticks, 50);
}

#[test]
fn meter_update_event_drives_flow() {
    let (mut manager, _) = manager(FakeClock::new());
    manager.handle(ManagerInput::Event(meter_update_event(TAP, 10)));
    let events = manager.handle(ManagerInput::Event(meter_update_event(TAP, 30)));
    assert_eq!(states(&events), vec![FlowState::Initial, FlowState::Active]);
}

#[test]
fn unknown_tap_is_rejected_without_events() {
    let (mut manager, _) = manager(FakeClock::new());
    let events = manager.handle(ManagerInput::Event(meter_update_event("nope.flow9", 10)));
    assert!(events.is_empty());
}

#[test]
fn presence_frame_becomes_token_event() {
    let (mut manager, _) = manager(FakeClock::new());
    let events = manager.handle(ManagerInput::Device(Message::OnewirePresence(
        OnewirePresence { device_id: 0x0000_1111_2222_3333, status: 1 },
    )));
    assert_eq!(
        events,
        vec![token_event(kb_core::ALIAS_ALL_TAPS, "core.onewire", ALICE, TokenState::Added)]
    );
    assert!(manager.auth().active_token(TAP).is_none());
}

#[test]
fn known_token_starts_user_flow_with_relay() {
    let (mut manager, _) = manager(FakeClock::new());
    let events =
        manager.handle(ManagerInput::Event(token_event(TAP, "core.onewire", ALICE, TokenState::Added)));

    let flow = manager.taps().flow(TAP).unwrap().unwrap();
    assert_eq!(flow.username.as_deref(), Some("alice"));
    assert!(events.contains(&Event::SetRelayOutput {
        output_name: "kegboard.relay0".to_string(),
        output_mode: RelayMode::Enabled,
    }));
    assert!(manager.auth().active_token(TAP).is_some());
}

#[test]
fn heartbeat_completes_idle_flow() {
    let clock = FakeClock::new();
    let (mut manager, _) = manager(clock.clone());
    manager.handle(meter(0));
    manager.handle(meter(20));

    clock.advance(Duration::from_secs(5));
    assert!(states(&manager.handle(ManagerInput::Event(Event::HeartbeatSecond {}))).is_empty());

    clock.advance(Duration::from_secs(10));
    let events = manager.handle(ManagerInput::Event(Event::HeartbeatSecond {}));
    assert_eq!(states(&events), vec![FlowState::Idle, FlowState::Completed]);
    assert!(manager.taps().flow(TAP).unwrap().is_none());
}

#[test]
fn flow_request_stop_completes_flow() {
    let (mut manager, _) = manager(FakeClock::new());
    manager.handle(ManagerInput::Event(flow_request_event(TAP, FlowAction::StartFlow)));
    assert!(manager.taps().flow(TAP).unwrap().is_some());

    let events = manager.handle(ManagerInput::Event(flow_request_event(TAP, FlowAction::StopFlow)));
    assert_eq!(states(&events), vec![FlowState::Completed]);
}

#[test]
fn other_events_are_ignored() {
    let (mut manager, _) = manager(FakeClock::new());
    assert!(manager.handle(ManagerInput::Event(Event::Ping {})).is_empty());
}

struct CollectStates(std::sync::Arc<parking_lot::Mutex<Vec<FlowState>>>);

impl EventHandler for CollectStates {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn kinds(&self) -> &[EventKind] {
        &[EventKind::FlowUpdate]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        if let Event::FlowUpdate { state, .. } = event {
            self.0.lock().push(*state);
        }
        Vec::new()
    }
}

#[test]
fn run_publishes_results_and_stops_on_shutdown() {
    let (manager, _) = manager(FakeClock::new());
    let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let mut hub = EventHub::new();
    hub.register(CollectStates(std::sync::Arc::clone(&seen)));
    let publisher = hub.publisher();
    let (tx, rx) = crossbeam_channel::unbounded();
    let shutdown = Shutdown::new();

    tx.send(meter(0)).unwrap();
    tx.send(meter(7)).unwrap();
    let thread = {
        let shutdown = shutdown.clone();
        std::thread::spawn(move || manager.run(rx, publisher, &shutdown))
    };

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while seen.lock().len() < 2 && std::time::Instant::now() < deadline {
        hub.process_pending(&Shutdown::new());
        std::thread::sleep(Duration::from_millis(5));
    }
    shutdown.trigger();
    thread.join().unwrap();

    assert_eq!(*seen.lock(), vec![FlowState::Initial, FlowState::Active]);
}

#[test]
fn forwarder_hands_events_to_inbox() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut forwarder = ManagerForwarder::new(tx);
    assert!(forwarder.kinds().contains(&EventKind::HeartbeatSecond));

    let event = meter_update_event(TAP, 1);
    assert!(forwarder.handle(&event).is_empty());
    assert_eq!(rx.try_recv().unwrap(), ManagerInput::Event(event));
}
