//! Protocol commands
//!
//! Defines the MAX! command ids carried in the fourth byte of every frame.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MAX! radio command ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandId {
    /// Device announces itself for pairing (0x00)
    PairPing,

    /// Controller accepts a pairing request (0x01)
    PairPong,

    /// Acknowledgment of a received command (0x02)
    Ack,

    /// Time request from a device, or time payload from the controller (0x03)
    TimeInformation,

    /// Week profile for one day (0x10)
    ConfigWeekProfile,

    /// Comfort/eco/min/max/offset/window temperatures (0x11)
    ConfigTemperatures,

    /// Boost, decalcification and valve limits (0x12)
    ConfigValve,

    /// Link two devices (0x20)
    AddLinkPartner,

    /// Unlink two devices (0x21)
    RemoveLinkPartner,

    /// Assign a group id (0x22)
    SetGroupId,

    /// Drop the group id (0x23)
    RemoveGroupId,

    /// Window contact open/closed report (0x30)
    ShutterContactState,

    /// Mode and setpoint change (0x40)
    SetTemperature,

    /// Wall thermostat setpoint and measured temperature (0x42)
    WallThermostatControl,

    /// Switch to comfort temperature (0x43)
    SetComfortTemperature,

    /// Switch to eco temperature (0x44)
    SetEcoTemperature,

    /// Push button report (0x50)
    PushButtonState,

    /// Radiator thermostat state report (0x60)
    ThermostatState,

    /// Wall thermostat state report (0x70)
    WallThermostatState,

    /// Toggle the wall thermostat's displayed temperature (0x82)
    SetDisplayActualTemperature,

    /// Factory reset (0xF0)
    Reset,

    /// Wake a device up (0xF1)
    WakeUp,
}

impl CommandId {
    /// Look up a command by its wire id
    pub fn from_u8(id: u8) -> Option<Self> {
        let command = match id {
            0x00 => CommandId::PairPing,
            0x01 => CommandId::PairPong,
            0x02 => CommandId::Ack,
            0x03 => CommandId::TimeInformation,
            0x10 => CommandId::ConfigWeekProfile,
            0x11 => CommandId::ConfigTemperatures,
            0x12 => CommandId::ConfigValve,
            0x20 => CommandId::AddLinkPartner,
            0x21 => CommandId::RemoveLinkPartner,
            0x22 => CommandId::SetGroupId,
            0x23 => CommandId::RemoveGroupId,
            0x30 => CommandId::ShutterContactState,
            0x40 => CommandId::SetTemperature,
            0x42 => CommandId::WallThermostatControl,
            0x43 => CommandId::SetComfortTemperature,
            0x44 => CommandId::SetEcoTemperature,
            0x50 => CommandId::PushButtonState,
            0x60 => CommandId::ThermostatState,
            0x70 => CommandId::WallThermostatState,
            0x82 => CommandId::SetDisplayActualTemperature,
            0xF0 => CommandId::Reset,
            0xF1 => CommandId::WakeUp,
            _ => return None,
        };
        Some(command)
    }

    /// Get the wire id
    pub fn as_u8(&self) -> u8 {
        match self {
            CommandId::PairPing => 0x00,
            CommandId::PairPong => 0x01,
            CommandId::Ack => 0x02,
            CommandId::TimeInformation => 0x03,
            CommandId::ConfigWeekProfile => 0x10,
            CommandId::ConfigTemperatures => 0x11,
            CommandId::ConfigValve => 0x12,
            CommandId::AddLinkPartner => 0x20,
            CommandId::RemoveLinkPartner => 0x21,
            CommandId::SetGroupId => 0x22,
            CommandId::RemoveGroupId => 0x23,
            CommandId::ShutterContactState => 0x30,
            CommandId::SetTemperature => 0x40,
            CommandId::WallThermostatControl => 0x42,
            CommandId::SetComfortTemperature => 0x43,
            CommandId::SetEcoTemperature => 0x44,
            CommandId::PushButtonState => 0x50,
            CommandId::ThermostatState => 0x60,
            CommandId::WallThermostatState => 0x70,
            CommandId::SetDisplayActualTemperature => 0x82,
            CommandId::Reset => 0xF0,
            CommandId::WakeUp => 0xF1,
        }
    }

    /// Commands devices send to the controller
    pub fn is_device_report(&self) -> bool {
        matches!(
            self,
            CommandId::PairPing
                | CommandId::Ack
                | CommandId::TimeInformation
                | CommandId::ShutterContactState
                | CommandId::WallThermostatControl
                | CommandId::PushButtonState
                | CommandId::ThermostatState
                | CommandId::WallThermostatState
        )
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({:02x})", self, self.as_u8())
    }
}
