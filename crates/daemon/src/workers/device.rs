// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kegboard device I/O: firmware gate, command writes and the mapping from
//! board messages to hub events.

use std::io::{Read, Write};
use std::sync::Arc;

use kb_core::{Event, TokenState};
use kb_kegboard::{KegboardError, KegboardReader, Message, Ping, SetOutput};
use parking_lot::Mutex;

use crate::shutdown::Shutdown;

/// Write half of the serial device, shared between the reader thread
/// (pings) and relay commands.
pub type DeviceWriter = Arc<Mutex<Box<dyn Write + Send>>>;

pub const ONEWIRE_AUTH_DEVICE: &str = "core.onewire";

pub fn device_writer(writer: impl Write + Send + 'static) -> DeviceWriter {
    Arc::new(Mutex::new(Box::new(writer)))
}

pub fn send_command(writer: &DeviceWriter, message: &Message) -> Result<(), KegboardError> {
    let mut w = writer.lock();
    kb_kegboard::write_message(&mut *w, message)
}

/// Fully qualified device name, e.g. `kegboard.flow0`.
pub fn board_device_name(board: &str, local: &str) -> String {
    format!("{board}.{local}")
}

/// Output number for a relay on this board: `<board>.relay<N>` or
/// `<board>.output<N>`.
pub fn relay_output_id(board: &str, output_name: &str) -> Option<u8> {
    let local = output_name.strip_prefix(board)?.strip_prefix('.')?;
    let digits = local.strip_prefix("relay").or_else(|| local.strip_prefix("output"))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Translate a board message into the event a core would act on.
///
/// Presence and auth-token frames carry no tap; they are credited to
/// `presence_tap`. Messages with no event counterpart yield `None`.
pub fn message_to_event(board: &str, presence_tap: &str, message: &Message) -> Option<Event> {
    match message {
        Message::MeterStatus(m) => Some(Event::MeterUpdate {
            tap_name: board_device_name(board, &m.meter_name),
            reading: u64::from(m.meter_reading),
        }),
        Message::TemperatureReading(m) => Some(Event::ThermoUpdate {
            sensor_name: board_device_name(board, &m.sensor_name),
            sensor_value: m.sensor_reading.as_celsius(),
        }),
        Message::OnewirePresence(m) => Some(Event::TokenAuth {
            tap_name: presence_tap.to_string(),
            auth_device_name: ONEWIRE_AUTH_DEVICE.to_string(),
            token_value: format!("{:016x}", m.device_id),
            status: token_state(m.status),
        }),
        Message::AuthToken(m) => Some(Event::TokenAuth {
            tap_name: presence_tap.to_string(),
            auth_device_name: format!("core.{}", m.device),
            token_value: m.token_hex(),
            status: token_state(m.status),
        }),
        _ => None,
    }
}

fn token_state(status: u8) -> TokenState {
    if status == 1 {
        TokenState::Added
    } else {
        TokenState::Removed
    }
}

/// Per-board session state: drops traffic until the board reports an
/// acceptable firmware version.
pub struct DeviceSession {
    board_name: String,
    required_firmware: u16,
    writer: DeviceWriter,
    ready: bool,
}

impl DeviceSession {
    pub fn new(board_name: impl Into<String>, required_firmware: u16, writer: DeviceWriter) -> Self {
        Self { board_name: board_name.into(), required_firmware, writer, ready: false }
    }

    pub fn board_name(&self) -> &str {
        &self.board_name
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn writer(&self) -> DeviceWriter {
        Arc::clone(&self.writer)
    }

    pub fn ping(&self) -> Result<(), KegboardError> {
        send_command(&self.writer, &Message::Ping(Ping))
    }

    /// Ping twice to prompt a Hello.
    pub fn start(&self) -> Result<(), KegboardError> {
        for _ in 0..2 {
            self.ping()?;
        }
        Ok(())
    }

    /// Pass a message through the firmware gate.
    pub fn accept(&mut self, message: Message) -> Option<Message> {
        if let Message::Hello(hello) = &message {
            let version = hello.firmware_version;
            if version >= self.required_firmware {
                if !self.ready {
                    tracing::info!(board = %self.board_name, version, "found kegboard");
                }
                self.ready = true;
            } else {
                tracing::error!(
                    board = %self.board_name,
                    version,
                    required = self.required_firmware,
                    "kegboard firmware too old, ignoring its messages until updated"
                );
                self.ready = false;
            }
        }

        if !self.ready {
            tracing::debug!(board = %self.board_name, kind = message.name(), "board not ready, dropping");
            if let Err(e) = self.ping() {
                tracing::warn!(board = %self.board_name, error = %e, "ping failed");
            }
            return None;
        }
        Some(message)
    }

    pub fn set_output(&self, output_id: u8, enabled: bool) -> Result<(), KegboardError> {
        send_command(&self.writer, &Message::SetOutput(SetOutput { output_id, output_mode: enabled }))
    }
}

/// Device I/O loop: read frames, gate them, and hand accepted messages to
/// `sink` until the stream ends, `sink` returns false, or shutdown.
pub fn run<R: Read>(
    mut reader: KegboardReader<R>,
    mut session: DeviceSession,
    shutdown: &Shutdown,
    mut sink: impl FnMut(Message) -> bool,
) -> Result<(), KegboardError> {
    tracing::info!(board = %session.board_name(), "device reader starting");
    session.start()?;

    while !shutdown.is_triggered() {
        match reader.next_message() {
            Ok(message) => {
                let Some(message) = session.accept(message) else { continue };
                if !sink(message) {
                    break;
                }
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(board = %session.board_name(), error = %e, "dropping kegboard frame");
            }
            Err(e) => {
                if shutdown.is_triggered() {
                    break;
                }
                return Err(e);
            }
        }
    }

    let stats = reader.stats();
    tracing::info!(
        board = %session.board_name(),
        frames = stats.frames,
        framing_losses = stats.framing_losses,
        decode_errors = stats.decode_errors,
        "device reader stopped"
    );
    Ok(())
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
