// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager thread: sole owner of tap, flow and token state.

use crossbeam_channel::{select, Receiver, Sender};
use kb_core::{AuthManager, Clock, Event, EventKind, FlowError, TapManager};
use kb_kegboard::Message;

use super::device::{board_device_name, message_to_event};
use crate::hub::{EventHandler, Publisher};
use crate::shutdown::Shutdown;

/// Work for the manager thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerInput {
    /// A frame from a locally attached board
    Device(Message),
    /// A hub event that mutates tap state
    Event(Event),
}

pub struct Manager<C: Clock> {
    taps: TapManager<C>,
    auth: AuthManager,
    board_name: String,
    presence_tap: String,
}

impl<C: Clock> Manager<C> {
    pub fn new(
        taps: TapManager<C>,
        auth: AuthManager,
        board_name: impl Into<String>,
        presence_tap: impl Into<String>,
    ) -> Self {
        Self { taps, auth, board_name: board_name.into(), presence_tap: presence_tap.into() }
    }

    pub fn taps(&self) -> &TapManager<C> {
        &self.taps
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Apply one input and return the events it produced.
    pub fn handle(&mut self, input: ManagerInput) -> Vec<Event> {
        let result = match &input {
            ManagerInput::Device(message) => self.handle_device(message),
            ManagerInput::Event(event) => self.handle_event(event),
        };
        match result {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, ?input, "manager rejected input");
                Vec::new()
            }
        }
    }

    fn handle_device(&mut self, message: &Message) -> Result<Vec<Event>, FlowError> {
        match message {
            Message::MeterStatus(m) => {
                let tap = board_device_name(&self.board_name, &m.meter_name);
                self.taps.update_flow(&tap, u64::from(m.meter_reading))
            }
            Message::Hello(m) => {
                tracing::debug!(version = m.firmware_version, "board hello");
                Ok(Vec::new())
            }
            Message::Configuration(m) => {
                tracing::info!(board = %m.board_name, baud = m.baud_rate, "board configuration");
                Ok(Vec::new())
            }
            Message::OutputStatus(m) => {
                tracing::debug!(output = %m.output_name, on = m.output_reading, "output status");
                Ok(Vec::new())
            }
            other => Ok(message_to_event(&self.board_name, &self.presence_tap, other)
                .into_iter()
                .collect()),
        }
    }

    fn handle_event(&mut self, event: &Event) -> Result<Vec<Event>, FlowError> {
        match event {
            Event::MeterUpdate { tap_name, reading } => self.taps.update_flow(tap_name, *reading),
            Event::FlowRequest { tap_name, request } => {
                self.taps.handle_flow_request(tap_name, *request)
            }
            Event::TokenAuth { tap_name, auth_device_name, token_value, status } => self
                .auth
                .handle_token_event(&mut self.taps, tap_name, auth_device_name, token_value, *status),
            Event::HeartbeatSecond {} => Ok(self.taps.service_idle_flows()),
            _ => Ok(Vec::new()),
        }
    }

    /// Consume the inbox until shutdown, publishing what each input produces.
    pub fn run(mut self, inbox: Receiver<ManagerInput>, publisher: Publisher, shutdown: &Shutdown) {
        tracing::info!(taps = ?self.taps.tap_names(), "manager running");
        loop {
            select! {
                recv(inbox) -> input => match input {
                    Ok(input) => publisher.publish_all(self.handle(input)),
                    Err(_) => break,
                },
                recv(shutdown.closed()) -> _ => break,
            }
        }
        tracing::info!("manager stopped");
    }
}

/// Hub handler that hands tap-affecting events to the manager thread.
pub struct ManagerForwarder {
    inbox: Sender<ManagerInput>,
}

impl ManagerForwarder {
    pub fn new(inbox: Sender<ManagerInput>) -> Self {
        Self { inbox }
    }
}

impl EventHandler for ManagerForwarder {
    fn name(&self) -> &'static str {
        "manager"
    }

    fn kinds(&self) -> &[EventKind] {
        &[
            EventKind::MeterUpdate,
            EventKind::FlowRequest,
            EventKind::TokenAuth,
            EventKind::HeartbeatSecond,
        ]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        if self.inbox.send(ManagerInput::Event(event.clone())).is_err() {
            tracing::warn!(event = event.name(), "manager inbox closed");
        }
        Vec::new()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
