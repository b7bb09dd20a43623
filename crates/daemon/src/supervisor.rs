// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread supervisor and watchdog.
//!
//! Every worker runs on a named OS thread with a liveness flag that drops
//! when the thread returns or unwinds. The watchdog turns an unexpected
//! exit into a quit event so the whole process shuts down in order.
//! A thread stopped through [`Supervisor::stop`] is expected to exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use kb_core::Event;

use crate::hub::Publisher;
use crate::lifecycle::LifecycleError;
use crate::shutdown::Shutdown;

pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Liveness flag of one supervised thread.
#[derive(Clone)]
pub struct Liveness {
    pub name: String,
    alive: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Gone without anyone asking it to stop.
    fn exited_unexpectedly(&self) -> bool {
        !self.is_alive() && !self.stop_requested()
    }
}

struct Worker {
    liveness: Liveness,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
}

pub struct Supervisor {
    shutdown: Shutdown,
    workers: Vec<Worker>,
}

impl Supervisor {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown, workers: Vec::new() }
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.liveness.name.as_str()).collect()
    }

    pub fn liveness(&self) -> Vec<Liveness> {
        self.workers.iter().map(|w| w.liveness.clone()).collect()
    }

    /// Start `body` on a thread called `name`. The thread gets its own
    /// child of the supervisor's shutdown signal.
    pub fn spawn<F>(&mut self, name: &str, body: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(Shutdown) + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let guard = AliveGuard(Arc::clone(&alive));
        let shutdown = self.shutdown.child();
        let signal = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = guard;
                body(signal);
            })
            .map_err(|e| LifecycleError::Spawn(name.to_string(), e))?;
        tracing::debug!(thread = name, "started thread");
        let liveness = Liveness {
            name: name.to_string(),
            alive,
            stop_requested: Arc::new(AtomicBool::new(false)),
        };
        self.workers.push(Worker { liveness, shutdown, handle });
        Ok(())
    }

    /// Signal the thread called `name` to stop, leaving the others running.
    /// The watchdog does not treat its exit as a fault. False if no such
    /// thread was spawned.
    pub fn stop(&self, name: &str) -> bool {
        let Some(worker) = self.workers.iter().find(|w| w.liveness.name == name) else {
            tracing::warn!(thread = name, "no such thread to stop");
            return false;
        };
        tracing::info!(thread = name, "stopping thread");
        worker.liveness.stop_requested.store(true, Ordering::SeqCst);
        worker.shutdown.trigger_local();
        true
    }

    /// Start the watchdog over every thread spawned so far.
    pub fn spawn_watchdog(
        &mut self,
        publisher: Publisher,
        interval: Duration,
    ) -> Result<(), LifecycleError> {
        let watched = self.liveness();
        self.spawn("watchdog", move |shutdown| watchdog(&watched, &publisher, &shutdown, interval))
    }

    /// Join threads until all have finished or `timeout` passes. Returns the
    /// names of threads still running, which are left detached.
    pub fn join(self, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.workers;
        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                remaining.into_iter().partition(|w| w.handle.is_finished());
            for worker in finished {
                if worker.handle.join().is_err() {
                    tracing::error!(thread = %worker.liveness.name, "thread panicked");
                } else {
                    tracing::debug!(thread = %worker.liveness.name, "joined thread");
                }
            }
            remaining = running;
            if remaining.is_empty() || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let stragglers: Vec<String> = remaining.iter().map(|w| w.liveness.name.clone()).collect();
        for name in &stragglers {
            tracing::warn!(thread = %name, "thread did not stop before drain timeout");
        }
        stragglers
    }
}

/// Poll `watched` every `interval` until shutdown. The first thread found
/// dead without a stop request records a fault and requests a quit.
pub fn watchdog(watched: &[Liveness], publisher: &Publisher, shutdown: &Shutdown, interval: Duration) {
    tracing::info!(threads = watched.len(), "watchdog running");
    while !shutdown.wait_timeout(interval) {
        let Some(dead) = watched.iter().find(|w| w.exited_unexpectedly()) else { continue };
        if shutdown.is_triggered() {
            break;
        }
        shutdown.record_fault(format!("thread {} exited unexpectedly", dead.name));
        if !publisher.publish(Event::quit()) {
            shutdown.trigger();
        }
        break;
    }
    tracing::info!("watchdog stopped");
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
