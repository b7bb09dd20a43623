// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use kb_core::{Event, EventKind};
use kb_kegnet::KegnetServer;

use crate::hub::EventHandler;

/// Reposts state changes to every connected Kegnet peer.
pub struct Subscription {
    server: Arc<KegnetServer>,
}

impl Subscription {
    pub fn new(server: Arc<KegnetServer>) -> Self {
        Self { server }
    }
}

impl EventHandler for Subscription {
    fn name(&self) -> &'static str {
        "subscription"
    }

    fn kinds(&self) -> &[EventKind] {
        &[
            EventKind::FlowUpdate,
            EventKind::DrinkCreated,
            EventKind::SetRelayOutput,
            EventKind::CreditAdded,
        ]
    }

    fn handle(&mut self, event: &Event) -> Vec<Event> {
        match self.server.send_event_to_clients(event) {
            Ok(sent) => tracing::trace!(event = event.name(), sent, "reposted to peers"),
            Err(e) => tracing::warn!(error = %e, event = event.name(), "failed to repost event"),
        }
        Vec::new()
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
