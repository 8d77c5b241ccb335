//! MAX! payload codecs
//!
//! Pure bit-level encoders and decoders, one per command. Decoders take the
//! raw payload bytes of an inbound frame; encoders produce the payload bytes
//! of an outbound frame. Fields whose bytes are missing from a short payload
//! decode as `None`, never as zero.

pub mod config;
pub mod contact;
pub mod pairing;
pub mod setpoint;
pub mod thermostat;
pub mod time;
pub mod wall;
pub mod week_profile;

use serde::Serialize;
use thiserror::Error;

use crate::protocol::CommandId;

pub use config::{TemperatureConfig, ValveConfig};
pub use contact::{PushButtonState, ShutterContactState};
pub use pairing::{AckState, PairPing};
pub use setpoint::{SetpointMode, VacationRequest};
pub use thermostat::{ThermostatMode, ThermostatState, UntilDate};
pub use wall::{WallThermostatControl, WallThermostatState};
pub use week_profile::SetPoint;

/// Lowest setpoint a MAX! thermostat accepts (shown as "off")
pub const MIN_TEMPERATURE: f64 = 4.5;

/// Highest setpoint a MAX! thermostat accepts (shown as "on")
pub const MAX_TEMPERATURE: f64 = 30.5;

/// Errors from payload codecs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Fewer bytes than the command's fixed fields
    #[error("{command} payload too short: need {needed} bytes, got {actual}")]
    TooShort {
        /// Command being decoded
        command: CommandId,
        /// Minimum length
        needed: usize,
        /// Received length
        actual: usize,
    },

    /// Argument outside what the encoding can express
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Check a payload carries at least `needed` bytes
pub(crate) fn require(
    command: CommandId,
    payload: &[u8],
    needed: usize,
) -> Result<(), PayloadError> {
    if payload.len() < needed {
        return Err(PayloadError::TooShort {
            command,
            needed,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// A decoded inbound payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    /// Pairing request
    PairPing(PairPing),
    /// Acknowledgment
    Ack(AckState),
    /// Device asks for the current time
    TimeRequest,
    /// Window contact report
    ShutterContact(ShutterContactState),
    /// Push button report
    PushButton(PushButtonState),
    /// Wall thermostat state
    WallThermostatState(WallThermostatState),
    /// Wall thermostat control
    WallThermostatControl(WallThermostatControl),
    /// Radiator thermostat state
    ThermostatState(ThermostatState),
}

/// Decode an inbound payload for `command`
///
/// Returns `Ok(None)` for commands that only flow from controller to device.
pub fn decode(command: CommandId, payload: &[u8]) -> Result<Option<Payload>, PayloadError> {
    let decoded = match command {
        CommandId::PairPing => Payload::PairPing(PairPing::decode(payload)?),
        CommandId::Ack => Payload::Ack(AckState::decode(payload)?),
        CommandId::TimeInformation => Payload::TimeRequest,
        CommandId::ShutterContactState => {
            Payload::ShutterContact(ShutterContactState::decode(payload)?)
        }
        CommandId::PushButtonState => Payload::PushButton(PushButtonState::decode(payload)?),
        CommandId::WallThermostatState => {
            Payload::WallThermostatState(WallThermostatState::decode(payload)?)
        }
        CommandId::WallThermostatControl => {
            Payload::WallThermostatControl(WallThermostatControl::decode(payload)?)
        }
        CommandId::ThermostatState => Payload::ThermostatState(ThermostatState::decode(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(decoded))
}

/// Clamp a setpoint to the range thermostats accept
pub fn clamp_temperature(temperature: f64) -> f64 {
    if temperature.is_nan() {
        return MIN_TEMPERATURE;
    }
    temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

/// Clamp and encode a setpoint as half degrees
pub fn encode_temperature(temperature: f64) -> u8 {
    (clamp_temperature(temperature) * 2.0).round() as u8
}

/// Decode half degrees
pub fn decode_temperature(raw: u8) -> f64 {
    f64::from(raw) / 2.0
}

/// Test a bit of a byte
pub(crate) fn bit(byte: u8, index: u8) -> bool {
    (byte >> index) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_temperature() {
        assert_eq!(clamp_temperature(2.0), 4.5);
        assert_eq!(clamp_temperature(35.0), 30.5);
        assert_eq!(clamp_temperature(21.5), 21.5);
        assert_eq!(clamp_temperature(f64::NAN), 4.5);
    }

    #[test]
    fn test_encode_temperature_half_degrees() {
        assert_eq!(encode_temperature(22.0), 44);
        assert_eq!(encode_temperature(4.5), 9);
        assert_eq!(encode_temperature(30.5), 61);
        assert_eq!(encode_temperature(100.0), 61);
        assert_eq!(decode_temperature(43), 21.5);
    }

    #[test]
    fn test_decode_dispatch() {
        assert!(matches!(
            decode(CommandId::TimeInformation, &[]),
            Ok(Some(Payload::TimeRequest))
        ));
        assert_eq!(decode(CommandId::SetTemperature, &[0x2c]), Ok(None));
        assert!(matches!(
            decode(CommandId::Ack, &[]),
            Err(PayloadError::TooShort { needed: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn test_bit() {
        assert!(bit(0b1000_0010, 1));
        assert!(bit(0b1000_0010, 7));
        assert!(!bit(0b1000_0010, 0));
    }
}
