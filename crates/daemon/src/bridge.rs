// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge mode: relay a locally attached kegboard to a remote core over
//! Kegnet, and drive the board's relays from the core's relay events.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kb_core::{Event, EventKind};
use kb_kegboard::KegboardReader;
use kb_kegnet::KegnetClient;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::handlers::RelayWriter;
use crate::hub::{EventHandler, EventHub, Publisher};
use crate::lifecycle::{finish_run, DeviceIo, LifecycleError, Outcome};
use crate::shutdown::Shutdown;
use crate::supervisor::{Supervisor, WATCHDOG_INTERVAL};
use crate::workers::device::{self, message_to_event, DeviceSession};

/// Events held while the core is unreachable; the oldest are dropped first.
pub const MAX_PENDING: usize = 1024;

/// Hub handler queueing board events for the core.
pub struct Uplink {
    outbox: UnboundedSender<Event>,
}

impl Uplink {
    pub fn new(outbox: UnboundedSender<Event>) -> Self {
        Self { outbox }
    }
}

impl EventHandler for Uplink {
    fn name(&self) -> &'static str {
        "uplink"
    }

    fn kinds(&self) -> &[EventKind] {
        &[EventKind::MeterUpdate, EventKind::ThermoUpdate, EventKind::TokenAuth]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        if self.outbox.send(event.clone()).is_err() {
            warn!(event = event.name(), "uplink closed, dropping event");
        }
        Vec::new()
    }
}

/// Bounded buffer of events waiting for the core.
#[derive(Debug, Default)]
pub struct Pending {
    events: VecDeque<Event>,
    dropped: u64,
}

impl Pending {
    pub fn push(&mut self, event: Event) {
        if self.events.len() >= MAX_PENDING {
            self.events.pop_front();
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                warn!(dropped = self.dropped, "core unreachable, dropping oldest events");
            }
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Send queued events in order until one fails.
    pub async fn flush(&mut self, client: &mut KegnetClient) {
        while let Some(event) = self.events.front() {
            match client.send_event(event).await {
                Ok(()) => {
                    self.events.pop_front();
                }
                Err(e) => {
                    warn!(error = %e, pending = self.events.len(), "send to core failed");
                    return;
                }
            }
        }
    }
}

/// Network side of the bridge: keep the connection up, push board events,
/// and publish what the core sends back.
pub async fn forward(
    mut client: KegnetClient,
    mut outbox: UnboundedReceiver<Event>,
    publisher: Publisher,
    cancel: CancellationToken,
) {
    let mut pending = Pending::default();
    loop {
        if !client.is_connected() {
            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                connected = client.reconnect() => connected,
            };
            while let Ok(event) = outbox.try_recv() {
                pending.push(event);
            }
            if !connected {
                continue;
            }
        }

        pending.flush(&mut client).await;
        if !client.is_connected() {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            event = outbox.recv() => match event {
                Some(event) => pending.push(event),
                None => break,
            },
            incoming = client.recv_event() => match incoming {
                Ok(Some(event)) => {
                    if event.kind() == EventKind::Quit {
                        warn!("ignoring quit from core");
                    } else {
                        publisher.publish(event);
                    }
                }
                Ok(None) => warn!(addr = %client.addr(), "core closed the connection"),
                Err(e) => warn!(error = %e, "bad message from core"),
            },
        }
    }

    pending.flush(&mut client).await;
    info!(unsent = pending.len(), dropped = pending.dropped(), "uplink stopped");
}

/// A running bridge.
pub struct Bridge {
    pub shutdown: Shutdown,
    pub publisher: Publisher,
    supervisor: Supervisor,
    start_time: Instant,
}

impl Bridge {
    pub fn thread_names(&self) -> Vec<&str> {
        self.supervisor.names()
    }

    pub fn stop(&self) {
        self.publisher.publish(Event::quit());
    }

    pub fn finish(self, drain: Duration) -> Outcome {
        finish_run(&self.shutdown, self.supervisor, drain, self.start_time)
    }
}

/// Start the bridge threads: `device-io`, `dispatch`, `network` and the
/// watchdog.
pub fn start_bridge(config: &Config, board: DeviceIo) -> Result<Bridge, LifecycleError> {
    let start_time = Instant::now();
    let shutdown = Shutdown::new();
    let mut hub = EventHub::new();
    let publisher = hub.publisher();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let DeviceIo { reader, writer } = board;

    hub.register(Uplink::new(outbox_tx));
    hub.register(RelayWriter::new(&config.device.board_name, Arc::clone(&writer)));

    let workers = Workers {
        reader,
        session: DeviceSession::new(
            &config.device.board_name,
            config.device.required_firmware,
            writer,
        ),
        board_name: config.device.board_name.clone(),
        presence_tap: config.flow.presence_tap.clone(),
        hub,
        client: KegnetClient::new(&config.kegnet.core_addr).with_backoff(config.reconnect_backoff()),
        outbox: outbox_rx,
        publisher: publisher.clone(),
    };
    let mut supervisor = Supervisor::new(shutdown.clone());
    if let Err(e) = spawn_workers(&mut supervisor, workers) {
        error!(error = %e, "bridge startup failed, stopping threads");
        shutdown.trigger();
        supervisor.join(crate::env::drain_timeout());
        return Err(e);
    }

    info!(core = %config.kegnet.core_addr, board = %config.device.board_name, "bridge started");
    Ok(Bridge { shutdown, publisher, supervisor, start_time })
}

struct Workers {
    reader: Box<dyn Read + Send>,
    session: DeviceSession,
    board_name: String,
    presence_tap: String,
    hub: EventHub,
    client: KegnetClient,
    outbox: UnboundedReceiver<Event>,
    publisher: Publisher,
}

fn spawn_workers(supervisor: &mut Supervisor, workers: Workers) -> Result<(), LifecycleError> {
    let Workers { reader, session, board_name, presence_tap, hub, client, outbox, publisher } =
        workers;

    {
        let publisher = publisher.clone();
        supervisor.spawn("device-io", move |shutdown| {
            let reader = KegboardReader::new(reader);
            let result = device::run(reader, session, &shutdown, |message| {
                match message_to_event(&board_name, &presence_tap, &message) {
                    Some(event) => publisher.publish(event),
                    None => true,
                }
            });
            if let Err(e) = result {
                error!(error = %e, "device reader failed");
            }
        })?;
    }
    supervisor.spawn("dispatch", move |shutdown| hub.run(&shutdown))?;
    {
        let publisher = publisher.clone();
        supervisor.spawn("network", move |shutdown| {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!(error = %e, "failed to start network runtime");
                    return;
                }
            };
            runtime.block_on(forward(client, outbox, publisher, shutdown.token()));
        })?;
    }
    supervisor.spawn_watchdog(publisher, WATCHDOG_INTERVAL)
}

/// Run the bridge until a signal or a fatal fault stops it.
pub fn run_bridge(config: &Config) -> Result<Outcome, LifecycleError> {
    let bridge = start_bridge(config, DeviceIo::open(&config.device.path)?)?;
    let drain = crate::env::drain_timeout();
    crate::lifecycle::wait_for_stop(&bridge.shutdown, &bridge.publisher, drain)?;
    Ok(bridge.finish(drain))
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
