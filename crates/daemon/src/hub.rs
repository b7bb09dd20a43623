// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event hub: one queue, many producers, handlers keyed by event kind.

use std::collections::BTreeMap;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender};
use kb_core::{Event, EventKind};

use crate::shutdown::Shutdown;

/// Events still queued after a quit are drained up to this many.
const DRAIN_LIMIT: usize = 1024;

/// A consumer of hub events.
///
/// Handlers run on the dispatch thread, one event at a time. Events they
/// return are published back onto the hub.
pub trait EventHandler: Send {
    fn name(&self) -> &'static str;

    fn kinds(&self) -> &[EventKind];

    fn handle(&mut self, event: &Event) -> Vec<Event>;
}

/// Cloneable producer side of the hub.
#[derive(Clone)]
pub struct Publisher {
    tx: Sender<Event>,
}

impl Publisher {
    /// Queue an event. False once the hub is gone.
    pub fn publish(&self, event: Event) -> bool {
        tracing::trace!(event = %event.log_summary(), "publish");
        self.tx.send(event).is_ok()
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            if !self.publish(event) {
                tracing::debug!("hub closed, dropping events");
                return;
            }
        }
    }
}

pub struct EventHub {
    rx: Receiver<Event>,
    publisher: Publisher,
    handlers: Vec<Box<dyn EventHandler>>,
    registry: BTreeMap<EventKind, Vec<usize>>,
    poll_interval: Duration,
    dispatched: u64,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            rx,
            publisher: Publisher { tx },
            handlers: Vec::new(),
            registry: BTreeMap::new(),
            poll_interval: Duration::from_secs(1),
            dispatched: 0,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Number of events dispatched so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Add a handler. Handlers for the same kind run in registration order.
    pub fn register(&mut self, handler: impl EventHandler + 'static) {
        let index = self.handlers.len();
        for kind in handler.kinds() {
            self.registry.entry(*kind).or_default().push(index);
        }
        tracing::debug!(handler = handler.name(), kinds = ?handler.kinds(), "registered handler");
        self.handlers.push(Box::new(handler));
    }

    pub fn handler_names(&self, kind: EventKind) -> Vec<&'static str> {
        self.registry
            .get(&kind)
            .map(|indices| indices.iter().map(|&i| self.handlers[i].name()).collect())
            .unwrap_or_default()
    }

    /// Invoke every handler registered for the event's kind and collect
    /// what they emit.
    pub fn dispatch(&mut self, event: &Event) -> Vec<Event> {
        self.dispatched += 1;
        let Some(indices) = self.registry.get(&event.kind()) else {
            tracing::trace!(event = event.name(), "no handlers");
            return Vec::new();
        };
        let mut emitted = Vec::new();
        for &index in indices {
            let handler = &mut self.handlers[index];
            let out = handler.handle(event);
            if !out.is_empty() {
                tracing::trace!(handler = handler.name(), count = out.len(), "handler emitted");
            }
            emitted.extend(out);
        }
        emitted
    }

    /// Dispatch one event and requeue its output. True if it was a quit.
    fn process(&mut self, event: Event, shutdown: &Shutdown) -> bool {
        tracing::debug!(event = %event.log_summary(), "dispatch");
        let quit = event.kind() == EventKind::Quit;
        if quit {
            shutdown.trigger();
        }
        let emitted = self.dispatch(&event);
        self.publisher.publish_all(emitted);
        quit
    }

    /// Dispatch everything queued right now without blocking.
    pub fn process_pending(&mut self, shutdown: &Shutdown) -> usize {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            count += 1;
            if self.process(event, shutdown) {
                break;
            }
        }
        count
    }

    fn drain(&mut self, shutdown: &Shutdown) {
        let mut drained = 0;
        while drained < DRAIN_LIMIT {
            let Ok(event) = self.rx.try_recv() else { break };
            if event.kind() != EventKind::Quit {
                self.process(event, shutdown);
            }
            drained += 1;
        }
        tracing::debug!(drained, "hub drained");
    }

    /// Dispatch loop. Returns after a quit event or a shutdown signal,
    /// once the queue has been drained.
    pub fn run(mut self, shutdown: &Shutdown) {
        tracing::info!(handlers = self.handlers.len(), "event hub running");
        let rx = self.rx.clone();
        let poll_interval = self.poll_interval;
        loop {
            select! {
                recv(rx) -> event => match event {
                    Ok(event) => {
                        if self.process(event, shutdown) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(shutdown.closed()) -> _ => break,
                default(poll_interval) => {
                    if shutdown.is_triggered() {
                        break;
                    }
                }
            }
        }
        self.drain(shutdown);
        tracing::info!(dispatched = self.dispatched, "event hub stopped");
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
