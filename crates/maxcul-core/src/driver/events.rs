//! Events emitted by the protocol engine

use serde::Serialize;

use crate::device::Address;
use crate::payload::{
    PushButtonState, ShutterContactState, ThermostatState, WallThermostatControl,
    WallThermostatState,
};

/// A decoded device report together with where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport<T> {
    /// Sending device
    pub src: Address,
    /// Signal strength in dBm
    pub rssi: Option<f64>,
    /// Decoded state
    #[serde(flatten)]
    pub state: T,
}

/// A device asking to be paired
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairDevice {
    /// Device address
    pub src: Address,
    /// Device type number (see [`DeviceType`](crate::DeviceType))
    pub device_type: u8,
    /// Firmware version byte
    pub firmware: u8,
    /// Test flag byte
    pub test: u8,
    /// Serial number, when sent
    pub serial: Option<String>,
    /// Raw payload hex
    pub raw: String,
    /// Signal strength in dBm
    pub rssi: Option<f64>,
}

/// Everything the engine reports to its subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum MaxEvent {
    /// The stick answered the version query
    Ready,
    /// Firmware version line, e.g. `V 1.67 CUL868`
    CulFirmwareVersion(String),
    /// Credit report
    CreditsReceived {
        /// Remaining duty-cycle budget
        credits: u32,
        /// Auxiliary counter
        aux: u32,
    },
    /// The stick hit its duty-cycle limit
    LimitOverflow,
    /// Pairing request
    PairDevice(PairDevice),
    /// Radiator thermostat state
    ThermostatStateReceived(DeviceReport<ThermostatState>),
    /// Wall thermostat state
    WallThermostatStateReceived(DeviceReport<WallThermostatState>),
    /// Wall thermostat control report
    WallThermostatControlReceived(DeviceReport<WallThermostatControl>),
    /// Window contact report
    ShutterContactStateReceived(DeviceReport<ShutterContactState>),
    /// Push button report
    PushButtonStateReceived(DeviceReport<PushButtonState>),
    /// A device asked for the current time
    DeviceRequestTimeInformation(Address),
    /// Transport error
    Error(String),
    /// The port was closed
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_serializes_flat() {
        let event = MaxEvent::ShutterContactStateReceived(DeviceReport {
            src: "0a1b2c".parse().unwrap(),
            rssi: Some(-60.5),
            state: ShutterContactState {
                is_open: true,
                rf_error: false,
                battery_low: false,
            },
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "ShutterContactStateReceived",
                "data": {
                    "src": "0a1b2c",
                    "rssi": -60.5,
                    "isOpen": true,
                    "rfError": false,
                    "batteryLow": false,
                }
            })
        );
    }

    #[test]
    fn test_unit_event() {
        assert_eq!(
            serde_json::to_value(MaxEvent::Ready).unwrap(),
            json!({ "event": "Ready" })
        );
    }
}
