//! Wall thermostat reports (0x70 state, 0x42 control)

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use super::{bit, require, PayloadError, ThermostatMode};
use crate::protocol::CommandId;

/// Display mode flag for "show measured temperature"
const DISPLAY_ACTUAL: u8 = 0x04;

/// Wall thermostat state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallThermostatState {
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
    /// Display shows the measured temperature
    pub display_actual_temperature: bool,
    /// Setpoint in °C
    pub desired_temperature: f64,
    /// Measured temperature in °C
    pub measured_temperature: Option<f64>,
}

impl WallThermostatState {
    /// Minimum payload length
    pub const MIN_LEN: usize = 3;

    /// Decode a wall thermostat state payload
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        require(CommandId::WallThermostatState, payload, Self::MIN_LEN)?;
        let flags = payload[0];
        let measured_temperature = payload
            .get(3..5)
            .map(|raw| f64::from(BigEndian::read_u16(raw)) / 10.0);

        Ok(Self {
            mode: ThermostatMode::from_bits(flags),
            dst_active: bit(flags, 3),
            lan_gateway: bit(flags, 4),
            panel_locked: bit(flags, 5),
            rf_error: bit(flags, 6),
            battery_low: bit(flags, 7),
            display_actual_temperature: payload[1] & DISPLAY_ACTUAL != 0,
            desired_temperature: f64::from(payload[2]) / 2.0,
            measured_temperature,
        })
    }
}

/// Wall thermostat control report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WallThermostatControl {
    /// Setpoint in °C
    pub desired_temperature: f64,
    /// Measured temperature in °C
    pub measured_temperature: f64,
}

impl WallThermostatControl {
    /// Decode; bit 7 of the first byte is bit 8 of the measured value
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        require(CommandId::WallThermostatControl, payload, 2)?;
        let measured = (u16::from(payload[0] & 0x80) << 1) | u16::from(payload[1]);
        Ok(Self {
            desired_temperature: f64::from(payload[0] & 0x7F) / 2.0,
            measured_temperature: f64::from(measured) / 10.0,
        })
    }
}

/// SetDisplayActualTemperature payload: show measured (`04`) or setpoint (`00`)
pub fn encode_display_mode(show_actual: bool) -> [u8; 1] {
    [if show_actual { DISPLAY_ACTUAL } else { 0x00 }]
}
