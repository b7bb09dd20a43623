// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core startup: build state, register handlers, start threads.

use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kb_core::{AlarmManager, AuthManager, Backend, Clock, Event, SystemClock, TapManager};
use kb_kegboard::KegboardReader;
use kb_kegnet::KegnetServer;
use tracing::{error, info};

use super::{LifecycleError, Outcome};
use crate::config::Config;
use crate::handlers::{DrinkRecorder, Heartbeat, RelayWriter, Subscription, ThermoRecorder};
use crate::hub::{EventHub, Publisher};
use crate::shutdown::Shutdown;
use crate::supervisor::{Supervisor, WATCHDOG_INTERVAL};
use crate::workers::device::{self, DeviceSession, DeviceWriter};
use crate::workers::{alarm, network, Manager, ManagerForwarder, ManagerInput};

/// Both halves of a locally attached board.
pub struct DeviceIo {
    pub reader: Box<dyn Read + Send>,
    pub writer: DeviceWriter,
}

impl DeviceIo {
    /// Open a serial device read/write. Line settings are left as the
    /// system has them.
    pub fn open(path: &std::path::Path) -> Result<Self, LifecycleError> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| LifecycleError::Device(path.to_path_buf(), e))?;
        let writer = file.try_clone()?;
        Ok(Self { reader: Box::new(file), writer: device::device_writer(writer) })
    }
}

/// A running core.
pub struct Core {
    pub shutdown: Shutdown,
    pub publisher: Publisher,
    pub server: Arc<KegnetServer>,
    pub alarms: Arc<AlarmManager<Event>>,
    pub backend: Arc<dyn Backend>,
    supervisor: Supervisor,
    start_time: Instant,
}

impl Core {
    pub fn thread_names(&self) -> Vec<&str> {
        self.supervisor.names()
    }

    /// Request an orderly stop through the hub.
    pub fn stop(&self) {
        self.publisher.publish(Event::quit());
    }

    /// Wait for the threads to stop and report how the run ended.
    pub fn finish(self, drain: Duration) -> Outcome {
        finish_run(&self.shutdown, self.supervisor, drain, self.start_time)
    }
}

/// Give a requested stop `drain` to take hold, join the threads, and turn
/// any recorded fault into the outcome.
pub(crate) fn finish_run(
    shutdown: &Shutdown,
    supervisor: Supervisor,
    drain: Duration,
    start_time: Instant,
) -> Outcome {
    if !shutdown.wait_timeout(drain) {
        shutdown.trigger();
    }
    let stragglers = supervisor.join(drain);
    info!(uptime_secs = start_time.elapsed().as_secs(), stragglers = stragglers.len(), "stopped");
    match shutdown.fault() {
        Some(reason) => Outcome::Fault(reason),
        None => Outcome::Clean,
    }
}

/// Tap and token state for the manager thread, taps taken from the backend.
pub fn build_manager<C: Clock>(
    config: &Config,
    backend: Arc<dyn Backend>,
    clock: C,
) -> Result<Manager<C>, LifecycleError> {
    let mut taps = TapManager::new(clock).with_idle_timeout(config.idle_timeout());
    for tap in backend.taps()? {
        taps.register_tap(&tap.meter_name, tap.relay_name.clone(), config.flow.max_meter_delta)?;
    }
    let auth = AuthManager::new(backend, config.auth_policies());
    Ok(Manager::new(taps, auth, &config.device.board_name, &config.flow.presence_tap))
}

/// Start the core from configuration alone.
pub fn startup(config: &Config) -> Result<Core, LifecycleError> {
    let backend: Arc<dyn Backend> = Arc::new(config.memory_backend());
    let listener = network::bind(&config.kegnet.bind_addr)?;
    let device = if config.device.enabled { Some(DeviceIo::open(&config.device.path)?) } else { None };
    startup_with(config, backend, listener, device)
}

/// Start the core over an explicit backend, listener and optional board.
pub fn startup_with(
    config: &Config,
    backend: Arc<dyn Backend>,
    listener: TcpListener,
    board: Option<DeviceIo>,
) -> Result<Core, LifecycleError> {
    let start_time = Instant::now();
    let shutdown = Shutdown::new();
    let mut hub = EventHub::new();
    let publisher = hub.publisher();
    let manager = build_manager(config, Arc::clone(&backend), SystemClock)?;
    let alarms = Arc::new(AlarmManager::new());
    let server = Arc::new(KegnetServer::new());
    let (inbox_tx, inbox_rx) = crossbeam_channel::unbounded::<ManagerInput>();

    let heartbeat = Heartbeat::new(Arc::clone(&alarms));
    heartbeat.start();
    hub.register(ManagerForwarder::new(inbox_tx.clone()));
    hub.register(DrinkRecorder::new(Arc::clone(&backend), config.flow.min_volume_ml));
    hub.register(ThermoRecorder::new(Arc::clone(&backend), SystemClock, &config.thermo));
    hub.register(Subscription::new(Arc::clone(&server)));
    hub.register(heartbeat);

    let board = board.map(|DeviceIo { reader, writer }| {
        hub.register(RelayWriter::new(&config.device.board_name, Arc::clone(&writer)));
        let session =
            DeviceSession::new(&config.device.board_name, config.device.required_firmware, writer);
        (reader, session)
    });

    let workers = Workers {
        board,
        inbox_tx,
        inbox_rx,
        manager,
        hub,
        server: Arc::clone(&server),
        listener,
        alarms: Arc::clone(&alarms),
        publisher: publisher.clone(),
    };
    let mut supervisor = Supervisor::new(shutdown.clone());
    if let Err(e) = spawn_workers(&mut supervisor, workers) {
        error!(error = %e, "startup failed, stopping threads");
        shutdown.trigger();
        supervisor.join(crate::env::drain_timeout());
        return Err(e);
    }

    info!(threads = ?supervisor.names(), "core started");
    publisher.publish(Event::StartComplete {});

    Ok(Core { shutdown, publisher, server, alarms, backend, supervisor, start_time })
}

/// Everything the worker threads take ownership of.
struct Workers {
    board: Option<(Box<dyn Read + Send>, DeviceSession)>,
    inbox_tx: crossbeam_channel::Sender<ManagerInput>,
    inbox_rx: crossbeam_channel::Receiver<ManagerInput>,
    manager: Manager<SystemClock>,
    hub: EventHub,
    server: Arc<KegnetServer>,
    listener: TcpListener,
    alarms: Arc<AlarmManager<Event>>,
    publisher: Publisher,
}

fn spawn_workers(supervisor: &mut Supervisor, workers: Workers) -> Result<(), LifecycleError> {
    let Workers { board, inbox_tx, inbox_rx, manager, hub, server, listener, alarms, publisher } =
        workers;

    if let Some((reader, session)) = board {
        supervisor.spawn("device-io", move |shutdown| {
            let reader = KegboardReader::new(reader);
            let result = device::run(reader, session, &shutdown, |message| {
                inbox_tx.send(ManagerInput::Device(message)).is_ok()
            });
            if let Err(e) = result {
                error!(error = %e, "device reader failed");
            }
        })?;
    }

    {
        let publisher = publisher.clone();
        supervisor.spawn("manager", move |shutdown| manager.run(inbox_rx, publisher, &shutdown))?;
    }
    supervisor.spawn("dispatch", move |shutdown| hub.run(&shutdown))?;
    {
        let publisher = publisher.clone();
        supervisor.spawn("network", move |shutdown| {
            if let Err(e) = network::run(server, listener, publisher, &shutdown) {
                error!(error = %e, "network thread failed");
            }
        })?;
    }
    {
        let publisher = publisher.clone();
        supervisor.spawn("alarm", move |shutdown| alarm::run(alarms, publisher, &shutdown))?;
    }
    supervisor.spawn_watchdog(publisher, WATCHDOG_INTERVAL)
}
