// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::workers::network;
use kb_core::{MemoryBackend, SystemClock, TapRecord};
use std::sync::Arc;

fn tap(name: &str) -> TapRecord {
    TapRecord { meter_name: name.to_string(), relay_name: None, ml_per_tick: 1.0 }
}

#[test]
fn exit_codes() {
    assert_eq!(Outcome::Clean.exit_code(), 0);
    assert_eq!(Outcome::Fault("x".to_string()).exit_code(), 1);
}

#[test]
fn build_manager_rejects_duplicate_backend_taps() {
    let backend = Arc::new(MemoryBackend::new().with_tap(tap("a.flow0")).with_tap(tap("a.flow0")));
    let err = build_manager(&Config::default(), backend, SystemClock).err().unwrap();
    assert!(matches!(err, LifecycleError::Flow(FlowError::AlreadyRegistered(_))), "got {err:?}");
}

#[test]
fn build_manager_applies_flow_config() {
    let mut config = Config::default();
    config.flow.idle_timeout_secs = 42;
    let backend = Arc::new(MemoryBackend::new().with_tap(tap("a.flow0")));
    let manager = build_manager(&config, backend, SystemClock).unwrap();
    assert_eq!(manager.taps().idle_timeout(), Duration::from_secs(42));
    assert_eq!(manager.taps().tap_names(), vec!["a.flow0"]);
}

#[test]
fn core_starts_all_threads_and_stops_cleanly() {
    let config = Config::default();
    let listener = network::bind("127.0.0.1:0").unwrap();
    let core =
        startup_with(&config, Arc::new(config.memory_backend()), listener, None).unwrap();
    assert_eq!(core.thread_names(), vec!["manager", "dispatch", "network", "alarm", "watchdog"]);

    core.stop();
    assert_eq!(core.finish(Duration::from_secs(5)), Outcome::Clean);
}

#[test]
fn wait_for_stop_returns_on_internal_shutdown() {
    let shutdown = Shutdown::new();
    let hub = crate::hub::EventHub::new();
    let trigger = shutdown.clone();
    let thread = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        trigger.trigger();
    });

    wait_for_stop(&shutdown, &hub.publisher(), Duration::from_secs(1)).unwrap();
    assert!(shutdown.is_triggered());
    thread.join().unwrap();
}

#[test]
fn errors_name_the_failing_resource() {
    let err = LifecycleError::BindFailed(
        "localhost:9805".to_string(),
        std::io::Error::from(std::io::ErrorKind::AddrInUse),
    );
    assert!(err.to_string().contains("localhost:9805"));

    let err = LifecycleError::Device(
        PathBuf::from("/dev/ttyUSB0"),
        std::io::Error::from(std::io::ErrorKind::NotFound),
    );
    assert!(err.to_string().starts_with("Failed to open device /dev/ttyUSB0"));
}
