//! Radiator thermostat state report (0x60)
//!
//! Layout:
//! - byte 0: flags (mode bits 0-1, dst bit 3, lan bit 4, panel lock bit 5,
//!   rf error bit 6, battery low bit 7)
//! - byte 1: valve position in percent
//! - byte 2: desired temperature (half degrees, bit 7 carries no setpoint)
//! - bytes 3-5: in vacation mode the until date, otherwise bytes 3-4 hold the
//!   measured temperature in tenths of a degree

use serde::Serialize;

use super::{bit, require, PayloadError};
use crate::protocol::CommandId;

/// Operating mode from the two low flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermostatMode {
    /// Week program
    Auto,
    /// Fixed setpoint
    Manual,
    /// Until a date
    Vacation,
    /// Valve opened for the boost duration
    Boost,
}

impl ThermostatMode {
    /// Decode from the low two bits
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ThermostatMode::Auto,
            1 => ThermostatMode::Manual,
            2 => ThermostatMode::Vacation,
            _ => ThermostatMode::Boost,
        }
    }

    /// Two-bit wire code
    pub fn code(&self) -> u8 {
        match self {
            ThermostatMode::Auto => 0b00,
            ThermostatMode::Manual => 0b01,
            ThermostatMode::Vacation => 0b10,
            ThermostatMode::Boost => 0b11,
        }
    }
}

/// Vacation end as reported by a thermostat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UntilDate {
    /// Day of month
    pub day: u8,
    /// Month (1-12)
    pub month: u8,
    /// Full year
    pub year: u16,
    /// Half-hour slot of the day (0-47)
    pub half_hour: u8,
}

impl UntilDate {
    /// Decode the three until bytes
    pub fn decode(u1: u8, u2: u8, u3: u8) -> Self {
        Self {
            day: u1 & 0x1F,
            month: ((u1 & 0xE0) >> 4) | (u2 >> 7),
            year: 2000 + u16::from(u2 & 0x3F),
            half_hour: u3 & 0x3F,
        }
    }

    /// Time of day as (hour, minute)
    pub fn time_of_day(&self) -> (u8, u8) {
        (self.half_hour / 2, if self.half_hour % 2 == 1 { 30 } else { 0 })
    }
}

/// Radiator thermostat state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatState {
    /// Operating mode
    pub mode: ThermostatMode,
    /// Daylight saving time active
    pub dst_active: bool,
    /// LAN gateway reachable
    pub lan_gateway: bool,
    /// Buttons locked
    pub panel_locked: bool,
    /// Radio error flagged by the device
    pub rf_error: bool,
    /// Battery low
    pub battery_low: bool,
    /// Valve opening in percent
    pub valve_position: u8,
    /// Setpoint in °C
    pub desired_temperature: f64,
    /// Measured temperature in °C, outside vacation mode
    pub measured_temperature: Option<f64>,
    /// Vacation end, in vacation mode
    pub until: Option<UntilDate>,
}

impl ThermostatState {
    /// Minimum payload length
    pub const MIN_LEN: usize = 3;

    /// Decode a thermostat state payload
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        require(CommandId::ThermostatState, payload, Self::MIN_LEN)?;
        let flags = payload[0];
        let mode = ThermostatMode::from_bits(flags);

        // Bytes 3-5 mean different things depending on the mode bits
        let (measured_temperature, until) = if mode == ThermostatMode::Vacation {
            let until = match payload.get(3..6) {
                Some(&[u1, u2, u3]) => Some(UntilDate::decode(u1, u2, u3)),
                _ => None,
            };
            (None, until)
        } else {
            let measured = match payload.get(3..5) {
                Some(&[u1, u2]) => {
                    let raw = (u16::from(u1 & 0x01) << 8) + u16::from(u2);
                    let celsius = f64::from(raw) / 10.0;
                    Some(if celsius < 1.0 { 0.0 } else { celsius })
                }
                _ => None,
            };
            (measured, None)
        };

        Ok(Self {
            mode,
            dst_active: bit(flags, 3),
            lan_gateway: bit(flags, 4),
            panel_locked: bit(flags, 5),
            rf_error: bit(flags, 6),
            battery_low: bit(flags, 7),
            valve_position: payload[1],
            desired_temperature: f64::from(payload[2] & 0x7F) / 2.0,
            measured_temperature,
            until,
        })
    }
}
