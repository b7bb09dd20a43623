// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration loaded from TOML, with environment overrides.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use kb_core::{
    AuthDevicePolicy, AuthPolicies, AuthToken, MemoryBackend, TapRecord, ALIAS_ALL_TAPS,
    MAX_METER_READING_DELTA,
};
use serde::Deserialize;
use thiserror::Error;

use crate::env;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Append logs here in addition to stderr
    pub log_file: Option<PathBuf>,
    pub kegnet: KegnetConfig,
    pub device: DeviceConfig,
    pub flow: FlowConfig,
    pub thermo: ThermoConfig,
    pub taps: Vec<TapRecord>,
    pub auth_devices: BTreeMap<String, AuthDeviceConfig>,
    /// Seed tokens for the in-memory backend
    pub tokens: Vec<AuthToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KegnetConfig {
    /// Core mode listen address
    pub bind_addr: String,
    /// Core address a bridge connects to
    pub core_addr: String,
    pub reconnect_backoff_secs: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Read the board directly from the core process
    pub enabled: bool,
    pub path: PathBuf,
    pub board_name: String,
    pub required_firmware: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    pub idle_timeout_secs: u64,
    pub max_meter_delta: u64,
    /// Completed flows at or below this volume are not recorded as drinks
    pub min_volume_ml: f64,
    /// Tap credited with presence tokens that carry no tap of their own
    pub presence_tap: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermoConfig {
    pub min_celsius: f64,
    pub max_celsius: f64,
    pub expire_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthDeviceConfig {
    pub captive: bool,
    pub max_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: None,
            kegnet: KegnetConfig::default(),
            device: DeviceConfig::default(),
            flow: FlowConfig::default(),
            thermo: ThermoConfig::default(),
            taps: vec![default_tap(0), default_tap(1)],
            auth_devices: BTreeMap::new(),
            tokens: Vec::new(),
        }
    }
}

fn default_tap(n: u8) -> TapRecord {
    TapRecord {
        meter_name: format!("kegboard.flow{n}"),
        relay_name: Some(format!("kegboard.relay{n}")),
        ml_per_tick: 1000.0 / 2200.0,
    }
}

impl Default for KegnetConfig {
    fn default() -> Self {
        Self {
            bind_addr: kb_kegnet::DEFAULT_ADDR.to_string(),
            core_addr: kb_kegnet::DEFAULT_ADDR.to_string(),
            reconnect_backoff_secs: vec![5, 5, 10, 10, 20, 20, 60],
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("/dev/ttyUSB0"),
            board_name: "kegboard".to_string(),
            required_firmware: 4,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 10,
            max_meter_delta: MAX_METER_READING_DELTA,
            min_volume_ml: 10.0,
            presence_tap: ALIAS_ALL_TAPS.to_string(),
        }
    }
}

impl Default for ThermoConfig {
    fn default() -> Self {
        Self { min_celsius: -20.0, max_celsius: 80.0, expire_secs: 120 }
    }
}

impl Config {
    /// Load from `path`, falling back to `KB_CONFIG` or `~/.kegbot/kbd.toml`.
    ///
    /// A missing file yields defaults. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(env::config_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    fn apply_env(&mut self) {
        if let Some(addr) = env::bind_addr() {
            self.kegnet.bind_addr = addr;
        }
        if let Some(addr) = env::core_addr() {
            self.kegnet.core_addr = addr;
        }
        if let Some(path) = env::device_path() {
            self.device.path = path;
        }
        if let Some(path) = env::log_file() {
            self.log_file = Some(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for tap in &self.taps {
            if tap.meter_name.is_empty() {
                return Err(ConfigError::Invalid("tap with empty meter_name".to_string()));
            }
            if !seen.insert(tap.meter_name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate tap {}", tap.meter_name)));
            }
        }
        if self.thermo.min_celsius >= self.thermo.max_celsius {
            return Err(ConfigError::Invalid(format!(
                "thermo range {}..{} is empty",
                self.thermo.min_celsius, self.thermo.max_celsius
            )));
        }
        if self.flow.min_volume_ml.is_nan() || self.flow.min_volume_ml < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "flow.min_volume_ml must be a non-negative volume, got {}",
                self.flow.min_volume_ml
            )));
        }
        if self.device.board_name.is_empty() {
            return Err(ConfigError::Invalid("device.board_name is empty".to_string()));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.flow.idle_timeout_secs)
    }

    pub fn reconnect_backoff(&self) -> kb_kegnet::Backoff {
        kb_kegnet::Backoff::from_secs(&self.kegnet.reconnect_backoff_secs)
    }

    /// Built-in device policies overlaid with `[auth_devices]`.
    pub fn auth_policies(&self) -> AuthPolicies {
        let mut policies = AuthPolicies::default();
        for (name, device) in &self.auth_devices {
            policies.insert(
                name.clone(),
                AuthDevicePolicy {
                    captive: device.captive,
                    max_idle: Duration::from_secs(device.max_idle_secs),
                },
            );
        }
        policies
    }

    /// In-memory backend seeded with the configured taps and tokens.
    pub fn memory_backend(&self) -> MemoryBackend {
        let backend = self.taps.iter().cloned().fold(MemoryBackend::new(), MemoryBackend::with_tap);
        self.tokens.iter().cloned().fold(backend, MemoryBackend::with_token)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
