// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth-token presence tracking.
//!
//! Each tap holds at most one active token. A token bound to a user starts
//! or renews that user's flow; removing a token from a captive reader ends
//! the flow.

use crate::backend::{Backend, BackendError};
use crate::clock::Clock;
use crate::event::{Event, TokenState};
use crate::tap::{FlowError, TapManager};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Tap name that addresses every registered tap.
pub const ALIAS_ALL_TAPS: &str = "__all_taps__";

/// How flows started by a given auth device behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthDevicePolicy {
    /// Flow ends as soon as the token is removed.
    pub captive: bool,
    pub max_idle: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthPolicies {
    devices: HashMap<String, AuthDevicePolicy>,
    default: AuthDevicePolicy,
}

impl Default for AuthPolicies {
    fn default() -> Self {
        let mut devices = HashMap::new();
        devices.insert(
            "core.onewire".to_string(),
            AuthDevicePolicy { captive: true, max_idle: Duration::from_secs(120) },
        );
        devices.insert(
            "core.rfid".to_string(),
            AuthDevicePolicy { captive: false, max_idle: Duration::from_secs(20) },
        );
        Self {
            devices,
            default: AuthDevicePolicy { captive: true, max_idle: Duration::from_secs(10) },
        }
    }
}

impl AuthPolicies {
    pub fn insert(&mut self, device: impl Into<String>, policy: AuthDevicePolicy) {
        self.devices.insert(device.into(), policy);
    }

    pub fn policy(&self, device: &str) -> AuthDevicePolicy {
        self.devices.get(device).copied().unwrap_or(self.default)
    }
}

/// A token currently present on a tap's reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub auth_device: String,
    pub token_value: String,
    pub tap_name: String,
    pub last_seen_ms: u64,
}

impl TokenRecord {
    fn is(&self, auth_device: &str, token_value: &str) -> bool {
        self.auth_device == auth_device && self.token_value == token_value
    }
}

pub struct AuthManager {
    backend: Arc<dyn Backend>,
    policies: AuthPolicies,
    tokens: HashMap<String, TokenRecord>,
}

impl AuthManager {
    pub fn new(backend: Arc<dyn Backend>, policies: AuthPolicies) -> Self {
        Self { backend, policies, tokens: HashMap::new() }
    }

    pub fn active_token(&self, tap_name: &str) -> Option<&TokenRecord> {
        self.tokens.get(tap_name)
    }

    pub fn handle_token_event<C: Clock>(
        &mut self,
        taps: &mut TapManager<C>,
        tap_name: &str,
        auth_device: &str,
        token_value: &str,
        status: TokenState,
    ) -> Result<Vec<Event>, FlowError> {
        let targets = if tap_name == ALIAS_ALL_TAPS {
            taps.tap_names()
        } else {
            taps.tap(tap_name)?;
            vec![tap_name.to_string()]
        };

        let mut events = Vec::new();
        for tap in targets {
            let produced = match status {
                TokenState::Added => self.token_added(taps, &tap, auth_device, token_value)?,
                TokenState::Removed => self.token_removed(taps, &tap, auth_device, token_value)?,
            };
            events.extend(produced);
        }
        Ok(events)
    }

    fn token_added<C: Clock>(
        &mut self,
        taps: &mut TapManager<C>,
        tap_name: &str,
        auth_device: &str,
        token_value: &str,
    ) -> Result<Vec<Event>, FlowError> {
        let now = taps.clock().epoch_ms();
        let mut events = Vec::new();

        if let Some(existing) = self.tokens.get_mut(tap_name) {
            if existing.is(auth_device, token_value) {
                existing.last_seen_ms = now;
                return Ok(events);
            }
            let (device, value) = (existing.auth_device.clone(), existing.token_value.clone());
            events.extend(self.token_removed(taps, tap_name, &device, &value)?);
        }

        self.tokens.insert(
            tap_name.to_string(),
            TokenRecord {
                auth_device: auth_device.to_string(),
                token_value: token_value.to_string(),
                tap_name: tap_name.to_string(),
                last_seen_ms: now,
            },
        );
        tracing::info!(tap = %tap_name, auth_device, token_value, "token added");

        let username = match self.backend.get_auth_token(auth_device, token_value) {
            Ok(token) if token.enabled => token.username,
            Ok(_) => {
                tracing::info!(auth_device, token_value, "token disabled");
                None
            }
            Err(BackendError::NoToken { .. }) => {
                tracing::info!(auth_device, token_value, "token not assigned");
                None
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "backend failed looking up token");
                events.push(Event::quit());
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, auth_device, token_value, "token lookup failed");
                None
            }
        };

        if let Some(username) = username {
            let policy = self.policies.policy(auth_device);
            events.extend(taps.start_flow(tap_name, Some(&username), policy.max_idle)?);
        }
        Ok(events)
    }

    fn token_removed<C: Clock>(
        &mut self,
        taps: &mut TapManager<C>,
        tap_name: &str,
        auth_device: &str,
        token_value: &str,
    ) -> Result<Vec<Event>, FlowError> {
        match self.tokens.get(tap_name) {
            Some(active) if active.is(auth_device, token_value) => {}
            _ => {
                tracing::warn!(tap = %tap_name, auth_device, token_value, "removed token was not active");
                return Ok(Vec::new());
            }
        }

        self.tokens.remove(tap_name);
        tracing::info!(tap = %tap_name, auth_device, token_value, "token removed");
        if self.policies.policy(auth_device).captive {
            taps.stop_flow(tap_name)
        } else {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
