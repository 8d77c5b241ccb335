//! Outbound commands
//!
//! Each helper clamps its inputs through the payload encoders, addresses the
//! packet and hands it to [`MaxDriver::build_and_send`].

use chrono::{Local, Weekday};
use tracing::debug;

use super::MaxDriver;
use crate::device::{Address, DeviceType};
use crate::payload::{
    setpoint, time, wall, week_profile, SetPoint, SetpointMode, TemperatureConfig,
    VacationRequest, ValveConfig,
};
use crate::protocol::{
    CommandId, Delivery, Packet, PacketBuilder, ProtocolError, FLAG_ACK_REQUESTED,
};

/// Flags for a group id: group 0 addresses one device, anything else the group
pub fn group_flags(group: u8) -> u8 {
    if group == 0 {
        0x00
    } else {
        FLAG_ACK_REQUESTED
    }
}

impl MaxDriver {
    fn builder(&self, command: CommandId, dest: Address) -> PacketBuilder {
        PacketBuilder::new(command)
            .source(self.base_address())
            .destination(dest)
    }

    fn grouped(builder: PacketBuilder, group: u8) -> PacketBuilder {
        builder.group(group).flags(group_flags(group))
    }

    /// Accept a pairing request from `dest`
    pub fn send_pair_pong(&self, dest: Address) -> Delivery {
        self.build_and_send(self.builder(CommandId::PairPong, dest).payload(vec![0x00]))
    }

    /// Change mode and setpoint
    ///
    /// `temperature` is clamped to 4.5-30.5 °C. Auto without a temperature
    /// returns to the week program; comfort and eco use the device's
    /// configured values. Vacation goes through [`send_vacation`](Self::send_vacation).
    pub fn send_desired_temperature(
        &self,
        dest: Address,
        temperature: Option<f64>,
        mode: SetpointMode,
        group: u8,
        device_type: Option<DeviceType>,
    ) -> Delivery {
        let (command, payload) = match setpoint::encode(mode, temperature) {
            Ok(encoded) => encoded,
            Err(err) => return Delivery::failed(ProtocolError::InvalidArgument(err.to_string())),
        };
        debug!(%dest, ?mode, ?temperature, "sending setpoint");
        let builder = self
            .builder(command, dest)
            .payload(payload)
            .device_type(device_type);
        self.build_and_send(Self::grouped(builder, group))
    }

    /// Send the temperature configuration
    pub fn send_config(
        &self,
        dest: Address,
        config: &TemperatureConfig,
        device_type: Option<DeviceType>,
    ) -> Delivery {
        self.build_and_send(
            self.builder(CommandId::ConfigTemperatures, dest)
                .payload(config.encode().to_vec())
                .device_type(device_type),
        )
    }

    /// Send the boost, decalcification and valve limits
    pub fn send_config_valve(
        &self,
        dest: Address,
        config: &ValveConfig,
        group: u8,
        device_type: Option<DeviceType>,
    ) -> Delivery {
        let builder = self
            .builder(CommandId::ConfigValve, dest)
            .payload(config.encode().to_vec())
            .device_type(device_type);
        self.build_and_send(Self::grouped(builder, group))
    }

    /// Send one day of the week program (up to 13 set-points, as two frames)
    pub fn send_week_profile(
        &self,
        dest: Address,
        day: Weekday,
        points: &[SetPoint],
        group: u8,
        device_type: Option<DeviceType>,
    ) -> Delivery {
        let payloads = match week_profile::encode(day, points) {
            Ok(payloads) => payloads,
            Err(err) => return Delivery::failed(ProtocolError::InvalidArgument(err.to_string())),
        };
        let deliveries = payloads
            .into_iter()
            .map(|payload| {
                let builder = self
                    .builder(CommandId::ConfigWeekProfile, dest)
                    .payload(payload)
                    .device_type(device_type);
                self.build_and_send(Self::grouped(builder, group))
            })
            .collect();
        Delivery::all(deliveries)
    }

    /// Hold a temperature until a date
    pub fn send_vacation(
        &self,
        dest: Address,
        request: &VacationRequest,
        group: u8,
        device_type: Option<DeviceType>,
    ) -> Delivery {
        let builder = self
            .builder(CommandId::SetTemperature, dest)
            .payload(setpoint::encode_vacation(request).to_vec())
            .device_type(device_type);
        self.build_and_send(Self::grouped(builder, group))
    }

    /// Make a wall thermostat show the measured (`true`) or set temperature
    pub fn send_display_toggle(&self, dest: Address, show_actual: bool) -> Delivery {
        self.build_and_send(
            self.builder(CommandId::SetDisplayActualTemperature, dest)
                .payload(wall::encode_display_mode(show_actual).to_vec())
                .flags(FLAG_ACK_REQUESTED)
                .device_type(Some(DeviceType::WallMountedThermostat)),
        )
    }

    /// Send the current local time
    ///
    /// Broadcasts (`dest` = [`Address::BROADCAST`]) resolve even when no
    /// device acks.
    pub fn send_time_information(
        &self,
        dest: Address,
        device_type: Option<DeviceType>,
    ) -> Delivery {
        let payload = time::encode(Local::now().naive_local());
        self.build_and_send(
            self.builder(CommandId::TimeInformation, dest)
                .payload(payload.to_vec())
                .flags(FLAG_ACK_REQUESTED)
                .device_type(device_type),
        )
    }

    /// Ask the stick for its credit balance
    ///
    /// The answer arrives as a [`MaxEvent::CreditsReceived`](super::MaxEvent).
    pub fn get_credits(&self) -> Delivery {
        match self.link() {
            Some(link) => link.enqueue(Packet::credit_query()),
            None => Delivery::failed(ProtocolError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_flags() {
        assert_eq!(group_flags(0), 0x00);
        assert_eq!(group_flags(1), 0x04);
        assert_eq!(group_flags(0xFF), 0x04);
    }
}
