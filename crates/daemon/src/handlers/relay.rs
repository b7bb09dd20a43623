// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kb_core::{Event, EventKind, RelayMode};
use kb_kegboard::{Message, SetOutput};

use crate::hub::EventHandler;
use crate::workers::device::{relay_output_id, send_command, DeviceWriter};

/// Drives relays on a locally attached board.
pub struct RelayWriter {
    board_name: String,
    writer: DeviceWriter,
}

impl RelayWriter {
    pub fn new(board_name: impl Into<String>, writer: DeviceWriter) -> Self {
        Self { board_name: board_name.into(), writer }
    }
}

impl EventHandler for RelayWriter {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn kinds(&self) -> &[EventKind] {
        &[EventKind::SetRelayOutput]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        let Event::SetRelayOutput { output_name, output_mode } = event else {
            return Vec::new();
        };
        let Some(output_id) = relay_output_id(&self.board_name, output_name) else {
            tracing::debug!(output = %output_name, board = %self.board_name, "not a relay on this board");
            return Vec::new();
        };
        let command = Message::SetOutput(SetOutput {
            output_id,
            output_mode: *output_mode == RelayMode::Enabled,
        });
        match send_command(&self.writer, &command) {
            Ok(()) => tracing::debug!(output = %output_name, mode = %output_mode, "relay set"),
            Err(e) => tracing::warn!(error = %e, output = %output_name, "failed to set relay"),
        }
        Vec::new()
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
