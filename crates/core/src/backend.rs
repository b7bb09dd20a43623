// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence boundary.
//!
//! The core never stores pours, tokens or sensor logs itself; everything
//! durable goes through a [`Backend`]. [`MemoryBackend`] is the built-in
//! implementation used when no external store is configured. It keeps
//! only the most recent [`MAX_HISTORY`] pours and sensor readings.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("no token {token_value} on {auth_device}")]
    NoToken { auth_device: String, token_value: String },
    #[error("backend rejected request: {0}")]
    Rejected(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("fatal backend error: {0}")]
    Fatal(String),
}

impl BackendError {
    /// Errors the core cannot continue past.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::Fatal(_))
    }
}

/// Tap configuration known to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapRecord {
    pub meter_name: String,
    #[serde(default)]
    pub relay_name: Option<String>,
    #[serde(default = "default_ml_per_tick")]
    pub ml_per_tick: f64,
}

fn default_ml_per_tick() -> f64 {
    1000.0 / 2200.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct PourRequest {
    pub tap_name: String,
    pub ticks: u64,
    pub username: Option<String>,
    pub pour_time_ms: u64,
    pub duration: Duration,
    pub shout: Option<String>,
}

/// A pour as persisted; volume is derived from the tap's calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PourRecord {
    pub drink_id: u64,
    pub tap_name: String,
    pub ticks: u64,
    pub volume_ml: f64,
    pub username: Option<String>,
    pub pour_time_ms: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub auth_device: String,
    pub token_value: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub sensor_name: String,
    pub value: f64,
    pub when_ms: u64,
}

pub trait Backend: Send + Sync {
    fn taps(&self) -> Result<Vec<TapRecord>, BackendError>;

    fn record_pour(&self, pour: &PourRequest) -> Result<PourRecord, BackendError>;

    fn get_auth_token(&self, auth_device: &str, token_value: &str)
        -> Result<AuthToken, BackendError>;

    fn create_auth_token(
        &self,
        auth_device: &str,
        token_value: &str,
        username: Option<&str>,
    ) -> Result<AuthToken, BackendError>;

    fn log_sensor_reading(&self, reading: &SensorReading) -> Result<(), BackendError>;
}

/// Pours and sensor readings retained by [`MemoryBackend`].
pub const MAX_HISTORY: usize = 1024;

#[derive(Default)]
struct MemoryState {
    taps: Vec<TapRecord>,
    tokens: HashMap<(String, String), AuthToken>,
    pours: VecDeque<PourRecord>,
    sensor_log: VecDeque<SensorReading>,
    last_drink_id: u64,
    pour_failure: Option<BackendError>,
}

/// Append `item`, evicting the oldest entries beyond [`MAX_HISTORY`].
fn push_capped<T>(log: &mut VecDeque<T>, item: T) {
    while log.len() >= MAX_HISTORY {
        log.pop_front();
    }
    log.push_back(item);
}

/// Process-local backend holding everything in memory.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tap(self, tap: TapRecord) -> Self {
        self.state.lock().taps.push(tap);
        self
    }

    pub fn with_token(self, token: AuthToken) -> Self {
        let key = (token.auth_device.clone(), token.token_value.clone());
        self.state.lock().tokens.insert(key, token);
        self
    }

    /// Make subsequent `record_pour` calls fail with `error`.
    pub fn fail_pours_with(&self, error: Option<BackendError>) {
        self.state.lock().pour_failure = error;
    }

    /// Retained pours, oldest first.
    pub fn pours(&self) -> Vec<PourRecord> {
        self.state.lock().pours.iter().cloned().collect()
    }

    pub fn sensor_readings(&self) -> Vec<SensorReading> {
        self.state.lock().sensor_log.iter().cloned().collect()
    }
}

impl Backend for MemoryBackend {
    fn taps(&self) -> Result<Vec<TapRecord>, BackendError> {
        Ok(self.state.lock().taps.clone())
    }

    fn record_pour(&self, pour: &PourRequest) -> Result<PourRecord, BackendError> {
        let mut state = self.state.lock();
        if let Some(error) = state.pour_failure.clone() {
            return Err(error);
        }
        let ml_per_tick = state
            .taps
            .iter()
            .find(|t| t.meter_name == pour.tap_name)
            .map(|t| t.ml_per_tick)
            .ok_or_else(|| BackendError::Rejected(format!("unknown tap {}", pour.tap_name)))?;

        state.last_drink_id += 1;
        let record = PourRecord {
            drink_id: state.last_drink_id,
            tap_name: pour.tap_name.clone(),
            ticks: pour.ticks,
            volume_ml: pour.ticks as f64 * ml_per_tick,
            username: pour.username.clone(),
            pour_time_ms: pour.pour_time_ms,
            duration_ms: pour.duration.as_millis() as u64,
        };
        push_capped(&mut state.pours, record.clone());
        Ok(record)
    }

    fn get_auth_token(
        &self,
        auth_device: &str,
        token_value: &str,
    ) -> Result<AuthToken, BackendError> {
        self.state
            .lock()
            .tokens
            .get(&(auth_device.to_string(), token_value.to_string()))
            .cloned()
            .ok_or_else(|| BackendError::NoToken {
                auth_device: auth_device.to_string(),
                token_value: token_value.to_string(),
            })
    }

    fn create_auth_token(
        &self,
        auth_device: &str,
        token_value: &str,
        username: Option<&str>,
    ) -> Result<AuthToken, BackendError> {
        let token = AuthToken {
            auth_device: auth_device.to_string(),
            token_value: token_value.to_string(),
            username: username.map(str::to_string),
            enabled: true,
        };
        let key = (token.auth_device.clone(), token.token_value.clone());
        let mut state = self.state.lock();
        if state.tokens.contains_key(&key) {
            return Err(BackendError::Rejected(format!(
                "token {token_value} already exists on {auth_device}"
            )));
        }
        state.tokens.insert(key, token.clone());
        Ok(token)
    }

    fn log_sensor_reading(&self, reading: &SensorReading) -> Result<(), BackendError> {
        push_capped(&mut self.state.lock().sensor_log, reading.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
