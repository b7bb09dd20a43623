//! Lifecycle specs
//!
//! The core starts its threads, survives misbehaving peers, stops cleanly
//! on request, and reports a fault when the board goes away.

use crate::prelude::*;

#[test]
fn core_runs_every_thread_and_stops_cleanly() {
    let running = start_core(Config::default());
    assert_eq!(
        running.core.thread_names(),
        vec!["device-io", "manager", "dispatch", "network", "alarm", "watchdog"]
    );
    assert_eq!(running.stop(), Outcome::Clean);
}

#[test]
fn peers_cannot_shut_the_core_down() {
    let running = start_core(Config::default());
    let mut peer = running.peer();

    peer.send(Event::quit());
    peer.send(Event::MeterUpdate { tap_name: "kegboard.flow0".to_string(), reading: 1 });
    peer.send(Event::MeterUpdate { tap_name: "kegboard.flow0".to_string(), reading: 2 });
    peer.expect("flow after quit", flow_update(FlowState::Active));
    assert!(!running.core.shutdown.is_triggered());

    drop(peer);
    assert_eq!(running.stop(), Outcome::Clean);
}

#[test]
fn losing_the_board_is_a_fault() {
    let mut running = start_core(Config::default());
    running.board.unplug();

    assert!(running.core.shutdown.wait_timeout(TIMEOUT));
    match running.core.finish(TIMEOUT) {
        Outcome::Fault(reason) => assert!(reason.contains("device-io"), "{reason}"),
        Outcome::Clean => panic!("expected a fault"),
    }
}
