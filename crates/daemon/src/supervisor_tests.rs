// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::hub::EventHub;

const FAST: Duration = Duration::from_millis(10);

fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn park_until_shutdown(shutdown: Shutdown) {
    let _ = shutdown.closed().recv();
}

#[test]
fn spawned_threads_are_named_and_joined() {
    let mut supervisor = Supervisor::new(Shutdown::new());
    supervisor.spawn("manager", park_until_shutdown).unwrap();
    supervisor.spawn("alarm", park_until_shutdown).unwrap();
    assert_eq!(supervisor.names(), vec!["manager", "alarm"]);

    let name = {
        let (tx, rx) = crossbeam_channel::bounded(1);
        supervisor
            .spawn("reporter", move |_| {
                let _ = tx.send(std::thread::current().name().map(str::to_string));
            })
            .unwrap();
        rx.recv().unwrap()
    };
    assert_eq!(name.as_deref(), Some("reporter"));

    supervisor.shutdown().trigger();
    assert!(supervisor.join(Duration::from_secs(5)).is_empty());
}

#[test]
fn liveness_drops_when_thread_returns() {
    let mut supervisor = Supervisor::new(Shutdown::new());
    supervisor.spawn("short", |_| {}).unwrap();
    supervisor.spawn("long", park_until_shutdown).unwrap();
    let liveness = supervisor.liveness();

    assert!(wait_until(|| !liveness[0].is_alive()));
    assert!(liveness[1].is_alive());

    supervisor.shutdown().trigger();
    supervisor.join(Duration::from_secs(5));
}

#[test]
fn watchdog_turns_unexpected_exit_into_quit() {
    let shutdown = Shutdown::new();
    let mut hub = EventHub::new();
    let mut supervisor = Supervisor::new(shutdown.clone());
    supervisor.spawn("manager", park_until_shutdown).unwrap();
    supervisor.spawn("network", |_| {}).unwrap();
    supervisor.spawn_watchdog(hub.publisher(), FAST).unwrap();

    assert!(wait_until(|| {
        hub.process_pending(&shutdown);
        shutdown.is_triggered()
    }));
    assert_eq!(shutdown.fault().as_deref(), Some("thread network exited unexpectedly"));
    assert!(supervisor.join(Duration::from_secs(5)).is_empty());
}

#[test]
fn watchdog_triggers_directly_when_hub_is_gone() {
    let shutdown = Shutdown::new();
    let hub = EventHub::new();
    let publisher = hub.publisher();
    drop(hub);

    let mut supervisor = Supervisor::new(shutdown.clone());
    supervisor.spawn("dispatch", |_| {}).unwrap();
    supervisor.spawn_watchdog(publisher, FAST).unwrap();

    assert!(wait_until(|| shutdown.is_triggered()));
    assert!(shutdown.fault().is_some());
    supervisor.join(Duration::from_secs(5));
}

#[test]
fn orderly_shutdown_is_not_a_fault() {
    let shutdown = Shutdown::new();
    let hub = EventHub::new();
    let mut supervisor = Supervisor::new(shutdown.clone());
    supervisor.spawn("manager", park_until_shutdown).unwrap();
    supervisor.spawn_watchdog(hub.publisher(), FAST).unwrap();

    std::thread::sleep(FAST * 3);
    shutdown.trigger();
    assert!(supervisor.join(Duration::from_secs(5)).is_empty());
    assert_eq!(shutdown.fault(), None);
}

#[test]
fn join_reports_threads_that_outlive_the_timeout() {
    let shutdown = Shutdown::new();
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let mut supervisor = Supervisor::new(shutdown.clone());
    supervisor
        .spawn("device-io", move |_| {
            let _ = release_rx.recv();
        })
        .unwrap();

    shutdown.trigger();
    let stragglers = supervisor.join(Duration::from_millis(50));
    assert_eq!(stragglers, vec!["device-io".to_string()]);
    drop(release_tx);
}

#[test]
fn stopping_one_thread_leaves_the_rest_running() {
    let shutdown = Shutdown::new();
    let hub = EventHub::new();
    let mut supervisor = Supervisor::new(shutdown.clone());
    supervisor.spawn("manager", park_until_shutdown).unwrap();
    supervisor.spawn("alarm", park_until_shutdown).unwrap();
    supervisor.spawn_watchdog(hub.publisher(), FAST).unwrap();
    let liveness = supervisor.liveness();

    assert!(supervisor.stop("alarm"));
    assert!(wait_until(|| !liveness[1].is_alive()));
    assert!(liveness[1].stop_requested());

    std::thread::sleep(FAST * 5);
    assert!(liveness[0].is_alive());
    assert!(liveness[2].is_alive());
    assert!(!shutdown.is_triggered());
    assert_eq!(shutdown.fault(), None);

    shutdown.trigger();
    assert!(supervisor.join(Duration::from_secs(5)).is_empty());
    assert_eq!(shutdown.fault(), None);
}

#[test]
fn stopping_an_unknown_thread_is_refused() {
    let mut supervisor = Supervisor::new(Shutdown::new());
    supervisor.spawn("manager", park_until_shutdown).unwrap();
    assert!(!supervisor.stop("network"));
    assert!(supervisor.liveness()[0].is_alive());

    supervisor.shutdown().trigger();
    supervisor.join(Duration::from_secs(5));
}

#[test]
fn stopped_thread_sees_its_own_token_cancelled() {
    let shutdown = Shutdown::new();
    let mut supervisor = Supervisor::new(shutdown.clone());
    let (tx, rx) = crossbeam_channel::bounded(1);
    supervisor
        .spawn("network", move |own| {
            let token = own.token();
            let _ = own.closed().recv();
            let _ = tx.send(token.is_cancelled());
        })
        .unwrap();

    assert!(supervisor.stop("network"));
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    assert!(!shutdown.token().is_cancelled());

    shutdown.trigger();
    assert!(supervisor.join(Duration::from_secs(5)).is_empty());
}
