//! Host configuration, loaded from JSON or from the environment.

use iosamurai_rs::config::{DEFAULT_RESYNC_INTERVAL_TICKS, DEFAULT_TIMEOUT_TICKS};
use iosamurai_rs::{AnalogConfig, ChannelConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

pub const ENV_ADDRESSES: &str = "IOSAMURAI_ADDRESSES";
pub const ENV_TIMEOUT_TICKS: &str = "IOSAMURAI_TIMEOUT_TICKS";
pub const ENV_CYCLE_US: &str = "IOSAMURAI_CYCLE_US";
pub const ENV_LOCAL_PORT: &str = "IOSAMURAI_LOCAL_PORT";

/// Default control-cycle period of the host loop.
pub const DEFAULT_CYCLE_US: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Semicolon-separated `ip:port` list, one channel per entry.
    pub addresses: String,
    /// First local port. Channel `i` binds `local_port + i`; `None` binds
    /// ephemeral ports.
    pub local_port: Option<u16>,
    /// Period of one control cycle.
    pub cycle_us: u64,
    pub timeout_ticks: u64,
    pub resync_probe: bool,
    pub resync_interval_ticks: u64,
    pub display_off: bool,
    pub analog_min: f32,
    pub analog_max: f32,
    pub analog_low_pass: bool,
    pub analog_round: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        let analog = AnalogConfig::default();
        Self {
            addresses: String::new(),
            local_port: None,
            cycle_us: DEFAULT_CYCLE_US,
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            resync_probe: false,
            resync_interval_ticks: DEFAULT_RESYNC_INTERVAL_TICKS,
            display_off: false,
            analog_min: analog.min,
            analog_max: analog.max,
            analog_low_pass: analog.low_pass,
            analog_round: analog.round,
        }
    }
}

impl HostConfig {
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid host configuration: {}", e))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json_str(&json)
    }

    /// Reads the `IOSAMURAI_*` variables; anything unset keeps its default.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(addresses) = lookup(ENV_ADDRESSES) {
            config.addresses = addresses;
        }
        if let Some(ticks) = parse_var(&lookup, ENV_TIMEOUT_TICKS)? {
            config.timeout_ticks = ticks;
        }
        if let Some(cycle_us) = parse_var(&lookup, ENV_CYCLE_US)? {
            config.cycle_us = cycle_us;
        }
        config.local_port = parse_var(&lookup, ENV_LOCAL_PORT)?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }

    /// Settings shared by every channel.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::default()
            .with_timeout_ticks(self.timeout_ticks)
            .with_resync_probe(self.resync_probe)
            .with_resync_interval_ticks(self.resync_interval_ticks)
            .with_display_off(self.display_off)
            .with_analog(AnalogConfig {
                min: self.analog_min,
                max: self.analog_max,
                low_pass: self.analog_low_pass,
                round: self.analog_round,
                ..AnalogConfig::default()
            })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("Invalid value for {}: {}", key, e)),
        None => Ok(None),
    }
}
