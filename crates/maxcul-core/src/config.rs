//! Driver configuration
//!
//! Everything the host platform hands to the driver: which serial device to
//! open, the controller's own radio address and a few timing knobs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::device::Address;
use crate::protocol::DEFAULT_BAUD_RATE;

/// Errors raised while loading or validating a [`CulConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Base address a controller uses unless configured otherwise
pub const DEFAULT_BASE_ADDRESS: Address = Address::new([0x12, 0x34, 0x56]);

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_base_address() -> Address {
    DEFAULT_BASE_ADDRESS
}

fn default_ready_timeout_ms() -> u64 {
    30_000
}

fn default_time_broadcast_secs() -> u64 {
    60 * 60
}

fn default_credit_poll_secs() -> u64 {
    5
}

/// Configuration for one CUL stick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CulConfig {
    /// Serial device path (e.g. "/dev/ttyACM0" or "COM3")
    pub serial_port: String,

    /// Baud rate of the serial line
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// This controller's own radio address
    #[serde(default = "default_base_address")]
    pub base_address: Address,

    /// Answer pairing pings from the start
    #[serde(default)]
    pub pairing_enabled: bool,

    /// How long the handshake waits for the firmware version line
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Interval of the TimeInformation broadcast (0 disables it)
    #[serde(default = "default_time_broadcast_secs")]
    pub time_broadcast_interval_secs: u64,

    /// Interval of the credit query (0 disables it)
    #[serde(default = "default_credit_poll_secs")]
    pub credit_poll_interval_secs: u64,
}

impl CulConfig {
    /// Create a configuration with default timings
    pub fn new(serial_port: impl Into<String>, base_address: Address) -> Self {
        Self {
            serial_port: serial_port.into(),
            baud_rate: default_baud_rate(),
            base_address,
            pairing_enabled: false,
            ready_timeout_ms: default_ready_timeout_ms(),
            time_broadcast_interval_secs: default_time_broadcast_secs(),
            credit_poll_interval_secs: default_credit_poll_secs(),
        }
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON configuration string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values make sense for a CUL stick
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial_port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial port is not set".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud rate must be non-zero".into()));
        }
        if self.base_address.is_broadcast() {
            return Err(ConfigError::Invalid(
                "base address must not be the broadcast address".into(),
            ));
        }
        Ok(())
    }

    /// Handshake ready timeout
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Time broadcast period, if enabled
    pub fn time_broadcast_interval(&self) -> Option<Duration> {
        (self.time_broadcast_interval_secs > 0)
            .then(|| Duration::from_secs(self.time_broadcast_interval_secs))
    }

    /// Credit poll period, if enabled
    pub fn credit_poll_interval(&self) -> Option<Duration> {
        (self.credit_poll_interval_secs > 0)
            .then(|| Duration::from_secs(self.credit_poll_interval_secs))
    }
}
