//! Window contact and push button reports

use serde::Serialize;

use super::{bit, require, PayloadError};
use crate::protocol::CommandId;

/// Window contact report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutterContactState {
    /// Window is open
    pub is_open: bool,
    /// Radio error flagged by the device
    pub rf_error: bool,
    /// Battery low
    pub battery_low: bool,
}

impl ShutterContactState {
    /// Decode from the first payload byte
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        require(CommandId::ShutterContactState, payload, 1)?;
        let flags = payload[0];
        Ok(Self {
            is_open: bit(flags, 1),
            rf_error: bit(flags, 6),
            battery_low: bit(flags, 7),
        })
    }
}

/// Push button report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushButtonState {
    /// Button pressed (the "auto" side)
    pub is_pressed: bool,
    /// Radio error flagged by the device
    pub rf_error: bool,
    /// Battery low
    pub battery_low: bool,
}

impl PushButtonState {
    /// Decode from the second payload byte
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        require(CommandId::PushButtonState, payload, 2)?;
        let flags = payload[1];
        Ok(Self {
            is_pressed: bit(flags, 0),
            rf_error: bit(flags, 6),
            battery_low: bit(flags, 7),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutter_contact_open() {
        let state = ShutterContactState::decode(&[0x12]).unwrap();
        assert!(state.is_open);
        assert!(!state.rf_error);
        assert!(!state.battery_low);

        let state = ShutterContactState::decode(&[0xC0]).unwrap();
        assert!(!state.is_open);
        assert!(state.rf_error);
        assert!(state.battery_low);
    }

    #[test]
    fn test_push_button_uses_second_byte() {
        let state = PushButtonState::decode(&[0x00, 0x01]).unwrap();
        assert!(state.is_pressed);

        let state = PushButtonState::decode(&[0x01, 0x80]).unwrap();
        assert!(!state.is_pressed);
        assert!(state.battery_low);
    }

    #[test]
    fn test_push_button_too_short() {
        assert_eq!(
            PushButtonState::decode(&[0x01]),
            Err(PayloadError::TooShort {
                command: CommandId::PushButtonState,
                needed: 2,
                actual: 1,
            })
        );
    }
}
