//! PairPing and Ack payloads

use serde::Serialize;

use super::{require, PayloadError};
use crate::protocol::CommandId;

/// Pairing request
///
/// Layout: firmware(1) · device type(1) · test flag(1) · serial (ASCII, rest)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairPing {
    /// Firmware version byte
    pub firmware: u8,
    /// Device type number
    pub device_type: u8,
    /// Test flag byte
    pub test: u8,
    /// Serial number printed on the device, when sent
    pub serial: Option<String>,
}

impl PairPing {
    /// Minimum payload length
    pub const MIN_LEN: usize = 3;

    /// Decode a pairing ping payload
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        require(CommandId::PairPing, payload, Self::MIN_LEN)?;
        let serial = payload[3..]
            .iter()
            .filter(|b| b.is_ascii_graphic())
            .map(|&b| b as char)
            .collect::<String>();
        Ok(Self {
            firmware: payload[0],
            device_type: payload[1],
            test: payload[2],
            serial: (!serial.is_empty()).then_some(serial),
        })
    }
}

/// Ack state byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AckState {
    /// Raw state (1 = OK)
    pub state: u8,
}

impl AckState {
    /// Decode an ack payload
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        require(CommandId::Ack, payload, 1)?;
        Ok(Self { state: payload[0] })
    }

    /// The device accepted the command
    pub fn is_ok(&self) -> bool {
        self.state == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_ping_with_serial() {
        let payload = [
            0x10, 0x01, 0xA0, 0x4E, 0x45, 0x51, 0x30, 0x36, 0x37, 0x31, 0x39, 0x38,
        ];
        let ping = PairPing::decode(&payload).unwrap();
        assert_eq!(ping.firmware, 0x10);
        assert_eq!(ping.device_type, 1);
        assert_eq!(ping.test, 0xA0);
        assert_eq!(ping.serial.as_deref(), Some("NEQ067198"));
    }

    #[test]
    fn test_pair_ping_too_short() {
        assert!(PairPing::decode(&[0x10, 0x01]).is_err());
        let ping = PairPing::decode(&[0x10, 0x04, 0x00]).unwrap();
        assert_eq!(ping.serial, None);
    }

    #[test]
    fn test_ack() {
        assert!(AckState::decode(&[0x01]).unwrap().is_ok());
        assert!(AckState::decode(&[0x01, 0x19, 0x00]).unwrap().is_ok());
        assert!(!AckState::decode(&[0x81]).unwrap().is_ok());
    }
}
