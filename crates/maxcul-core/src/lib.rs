//! # maxcul Core Library
//!
//! Drives a CUL 868 MHz USB stick and speaks the MAX! radio protocol to
//! radiator thermostats, wall thermostats, window contacts and push buttons.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame parsing and serialization for the CUL's line-oriented text protocol
//! - Bit-level payload codecs for every MAX! command the controller handles
//! - A credit-aware, single-flight link driver with ack/retry handling
//! - The protocol engine that turns high-level commands into packets and
//!   inbound frames into typed events
//!
//! ## Example
//!
//! ```rust,ignore
//! use maxcul_core::{CulConfig, MaxDriver, MaxEvent};
//!
//! let config = CulConfig::new("/dev/ttyACM0", "123456".parse()?);
//! let driver = MaxDriver::new(config);
//! let mut events = driver.subscribe();
//! driver.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let MaxEvent::ThermostatStateReceived(report) = event {
//!         println!("{} wants {}°C", report.src, report.state.desired_temperature);
//!     }
//! }
//! ```

pub mod config;
pub mod device;
pub mod driver;
pub mod payload;
pub mod protocol;

pub use config::{ConfigError, CulConfig};
pub use device::{Address, DeviceType};
pub use driver::{DeviceReport, MaxDriver, MaxEvent, PairDevice};
pub use protocol::{Delivery, ProtocolError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CulConfig;
    pub use crate::device::{Address, DeviceType};
    pub use crate::driver::{MaxDriver, MaxEvent};
    pub use crate::payload::{
        SetPoint, SetpointMode, TemperatureConfig, ThermostatMode, ValveConfig,
    };
    pub use crate::protocol::{CommandId, Delivery, Packet, ProtocolError};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
