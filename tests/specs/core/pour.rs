//! Pour specs
//!
//! Meter ticks from the board become a flow that peers watch, and stopping
//! the flow records a drink.

use crate::prelude::*;

#[test]
fn meter_ticks_start_a_flow_that_peers_see() {
    let running = start_core(Config::default());
    let mut peer = running.peer();

    running.board.meter("flow0", 100);
    running.board.meter("flow0", 150);

    let initial = peer.expect("initial flow", flow_update(FlowState::Initial));
    let Event::FlowUpdate { tap_name, username, ticks, .. } = initial else { unreachable!() };
    assert_eq!(tap_name, "kegboard.flow0");
    assert_eq!(username, None);
    assert_eq!(ticks, 0);

    let active = peer.expect("active flow", flow_update(FlowState::Active));
    assert!(matches!(active, Event::FlowUpdate { ticks: 50, .. }));

    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}

#[test]
fn stop_request_completes_the_flow_and_records_a_drink() {
    let running = start_core(Config::default());
    let mut peer = running.peer();

    running.board.meter("flow0", 1000);
    running.board.meter("flow0", 1440);
    peer.expect("active flow", flow_update(FlowState::Active));

    peer.send(Event::FlowRequest {
        tap_name: "kegboard.flow0".to_string(),
        request: FlowAction::StopFlow,
    });
    let completed = peer.expect("completed flow", flow_update(FlowState::Completed));
    let drink = peer.expect("drink", |e| matches!(e, Event::DrinkCreated { .. }));

    let (Event::FlowUpdate { flow_id, .. }, Event::DrinkCreated { flow_id: drink_flow, tap_name, .. }) =
        (completed, drink)
    else {
        unreachable!()
    };
    assert_eq!(flow_id, drink_flow);
    assert_eq!(tap_name, "kegboard.flow0");

    let pours = running.backend.pours();
    assert_eq!(pours.len(), 1);
    assert_eq!(pours[0].ticks, 440);

    running.board.wait_for_command(&Message::SetOutput(SetOutput { output_id: 0, output_mode: false }));
    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}

#[test]
fn out_of_range_jump_is_not_poured() {
    let running = start_core(Config::default());
    let mut peer = running.peer();

    running.board.meter("flow0", 10);
    running.board.meter("flow0", 100_000);
    running.board.meter("flow0", 100_020);

    let active = peer.expect("active flow", flow_update(FlowState::Active));
    assert!(matches!(active, Event::FlowUpdate { ticks: 20, .. }));

    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}

#[test]
fn peer_readings_drive_flows_without_a_board_message() {
    let running = start_core(Config::default());
    let mut peer = running.peer();

    peer.send(Event::MeterUpdate { tap_name: "kegboard.flow1".to_string(), reading: 5 });
    peer.send(Event::MeterUpdate { tap_name: "kegboard.flow1".to_string(), reading: 17 });

    let active = peer.expect("active flow", flow_update(FlowState::Active));
    assert!(matches!(
        active,
        Event::FlowUpdate { ref tap_name, ticks: 12, .. } if tap_name == "kegboard.flow1"
    ));

    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}
