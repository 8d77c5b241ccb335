//! Device addressing and device classes

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 3-byte MAX! radio address, written as six hex characters (`160bd0`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address([u8; 3]);

impl Address {
    /// Broadcast address (`000000`)
    pub const BROADCAST: Address = Address([0, 0, 0]);

    /// Create an address from its raw bytes
    pub const fn new(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes, most significant first
    pub fn bytes(&self) -> [u8; 3] {
        self.0
    }

    /// Whether this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

/// Error returned when an address string is not six hex digits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAX! address '{0}': expected 6 hex digits")]
pub struct ParseAddressError(pub String);

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseAddressError(s.to_string()));
        }
        let mut bytes = [0u8; 3];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseAddressError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl From<[u8; 3]> for Address {
    fn from(bytes: [u8; 3]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// MAX! device classes, numbered the way pairing pings report them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// MAX! Cube gateway
    Cube,
    /// Radiator thermostat
    HeatingThermostat,
    /// Radiator thermostat plus
    HeatingThermostatPlus,
    /// Wall mounted thermostat
    WallMountedThermostat,
    /// Window contact
    ShutterContact,
    /// Eco push button
    PushButton,
}

impl DeviceType {
    /// Look up a device type by its wire number
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DeviceType::Cube),
            1 => Some(DeviceType::HeatingThermostat),
            2 => Some(DeviceType::HeatingThermostatPlus),
            3 => Some(DeviceType::WallMountedThermostat),
            4 => Some(DeviceType::ShutterContact),
            5 => Some(DeviceType::PushButton),
            _ => None,
        }
    }

    /// Wire number of this device type
    pub fn as_u8(&self) -> u8 {
        match self {
            DeviceType::Cube => 0,
            DeviceType::HeatingThermostat => 1,
            DeviceType::HeatingThermostatPlus => 2,
            DeviceType::WallMountedThermostat => 3,
            DeviceType::ShutterContact => 4,
            DeviceType::PushButton => 5,
        }
    }
}
