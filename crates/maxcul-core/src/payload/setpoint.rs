//! SetTemperature (0x40) and vacation payloads
//!
//! The single payload byte carries the mode code in bits 6-7 and the setpoint
//! in half degrees in bits 0-5. Comfort and eco have their own commands with
//! an empty payload.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{encode_temperature, PayloadError, ThermostatMode};
use crate::protocol::CommandId;

/// Setpoint used for [`SetpointMode::WindowOpen`] when none is given
pub const DEFAULT_WINDOW_OPEN_TEMPERATURE: f64 = 12.0;

/// Mode requested together with a setpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetpointMode {
    /// Follow the week program
    Auto,
    /// Hold the given temperature
    Manual,
    /// Vacation, sent through [`encode_vacation`]
    Vacation,
    /// Boost
    Boost,
    /// Switch to the configured comfort temperature
    Comfort,
    /// Switch to the configured eco temperature
    Eco,
    /// Manual hold at the window-open temperature
    WindowOpen,
}

/// Vacation request: hold `temperature` until `until`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VacationRequest {
    /// Setpoint in °C
    pub temperature: f64,
    /// Local end time, rounded down to the half hour
    pub until: NaiveDateTime,
}

fn mode_byte(mode: ThermostatMode, temperature: f64) -> u8 {
    (mode.code() << 6) | (encode_temperature(temperature) & 0x3F)
}

/// Encode a setpoint change into its command and payload
pub fn encode(
    mode: SetpointMode,
    temperature: Option<f64>,
) -> Result<(CommandId, Vec<u8>), PayloadError> {
    let encoded = match (mode, temperature) {
        (SetpointMode::Auto, None) => (CommandId::SetTemperature, vec![0x00]),
        (SetpointMode::Auto, Some(t)) => (
            CommandId::SetTemperature,
            vec![mode_byte(ThermostatMode::Auto, t)],
        ),
        (SetpointMode::Manual, Some(t)) => (
            CommandId::SetTemperature,
            vec![mode_byte(ThermostatMode::Manual, t)],
        ),
        (SetpointMode::Boost, Some(t)) => (
            CommandId::SetTemperature,
            vec![mode_byte(ThermostatMode::Boost, t)],
        ),
        (SetpointMode::WindowOpen, t) => (
            CommandId::SetTemperature,
            vec![mode_byte(
                ThermostatMode::Manual,
                t.unwrap_or(DEFAULT_WINDOW_OPEN_TEMPERATURE),
            )],
        ),
        (SetpointMode::Comfort, _) => (CommandId::SetComfortTemperature, Vec::new()),
        (SetpointMode::Eco, _) => (CommandId::SetEcoTemperature, Vec::new()),
        (SetpointMode::Vacation, _) => {
            return Err(PayloadError::InvalidValue(
                "vacation needs an end date".to_string(),
            ))
        }
        (mode, None) => {
            return Err(PayloadError::InvalidValue(format!(
                "{:?} needs a temperature",
                mode
            )))
        }
    };
    Ok(encoded)
}

/// Encode a vacation request (command 0x40, 4 bytes)
pub fn encode_vacation(request: &VacationRequest) -> [u8; 4] {
    let until = request.until;
    let month = until.month() as u8;
    let day = until.day() as u8;
    let year = (until.year() - 2000).clamp(0, 0x3F) as u8;
    let half_hour = until.hour() as u8 * 2 + u8::from(until.minute() >= 30);
    [
        mode_byte(ThermostatMode::Vacation, request.temperature),
        ((month & 0x0E) << 4) | day,
        ((month & 0x01) << 7) | year,
        half_hour,
    ]
}
