//! Inbound line handling
//!
//! Every line from the stick goes through [`MaxDriver::handle_inbound_line`].
//! Nothing here propagates errors: malformed lines, unknown commands and
//! undecodable payloads are logged and dropped.

use tracing::{debug, info, warn};

use super::{DeviceReport, MaxDriver, MaxEvent, PairDevice};
use crate::payload::{
    AckState, PairPing, PayloadError, PushButtonState, ShutterContactState, ThermostatState,
    WallThermostatControl, WallThermostatState,
};
use crate::protocol::{parse_line, CommandId, FrameError, InboundLine, Packet};

type Handler = fn(&MaxDriver, &Packet) -> Result<(), PayloadError>;

impl MaxDriver {
    /// Process one line received from the stick
    pub fn handle_inbound_line(&self, line: &str) {
        match parse_line(line, self.base_address()) {
            Ok(InboundLine::Credits(report)) => {
                debug!(credits = report.credits, aux = report.aux, "credits reported");
                if let Some(link) = self.link() {
                    link.update_credits(report.credits);
                }
                self.emit(MaxEvent::CreditsReceived {
                    credits: report.credits,
                    aux: report.aux,
                });
            }
            Ok(InboundLine::FirmwareVersion(version)) => {
                info!(%version, "CUL firmware");
                self.emit(MaxEvent::CulFirmwareVersion(version));
                self.emit(MaxEvent::Ready);
            }
            Ok(InboundLine::LimitOverflow) => {
                warn!("CUL reached its duty-cycle limit (LOVF)");
                self.emit(MaxEvent::LimitOverflow);
            }
            Ok(InboundLine::Frame(packet)) => self.dispatch(packet),
            Ok(InboundLine::Unknown(line)) => info!(%line, "unknown line from CUL"),
            Err(FrameError::Empty) => {}
            Err(err) => warn!(error = %err, line = line.trim_end(), "dropping malformed frame"),
        }
    }

    fn dispatch(&self, packet: Packet) {
        if packet.source == self.base_address() {
            debug!(raw = %packet.to_hex(), "ignoring own echo");
            return;
        }
        let Some(command) = packet.command_id() else {
            debug!(command = packet.command, src = %packet.source, "unknown command id");
            return;
        };

        let handler: Option<Handler> = match command {
            CommandId::PairPing => Some(Self::on_pair_ping),
            CommandId::Ack => Some(Self::on_ack),
            CommandId::TimeInformation => Some(Self::on_time_request),
            CommandId::ShutterContactState => Some(Self::on_shutter_contact_state),
            CommandId::PushButtonState => Some(Self::on_push_button_state),
            CommandId::WallThermostatState => Some(Self::on_wall_thermostat_state),
            CommandId::WallThermostatControl => Some(Self::on_wall_thermostat_control),
            CommandId::ThermostatState => Some(Self::on_thermostat_state),
            _ => None,
        };
        let Some(handler) = handler else {
            debug!(%command, src = %packet.source, "no handler for command");
            return;
        };

        if let Err(err) = handler(self, &packet) {
            warn!(error = %err, src = %packet.source, raw = %packet.payload_hex(), "dropping packet");
        }
    }

    fn report<T>(packet: &Packet, state: T) -> DeviceReport<T> {
        DeviceReport {
            src: packet.source,
            rssi: packet.rssi,
            state,
        }
    }

    fn on_pair_ping(&self, packet: &Packet) -> Result<(), PayloadError> {
        let ping = PairPing::decode(&packet.payload)?;
        info!(
            src = %packet.source,
            device_type = ping.device_type,
            serial = ping.serial.as_deref().unwrap_or("-"),
            "pairing request"
        );
        self.emit(MaxEvent::PairDevice(PairDevice {
            src: packet.source,
            device_type: ping.device_type,
            firmware: ping.firmware,
            test: ping.test,
            serial: ping.serial,
            raw: packet.payload_hex(),
            rssi: packet.rssi,
        }));

        if !self.pairing_enabled() {
            debug!("pairing is disabled, not answering");
            return Ok(());
        }
        if !packet.destination.is_broadcast() && !packet.for_me {
            debug!(dst = %packet.destination, "pairing request is for another controller");
            return Ok(());
        }

        info!(src = %packet.source, "pairing device");
        drop(self.send_pair_pong(packet.source));
        Ok(())
    }

    fn on_ack(&self, packet: &Packet) -> Result<(), PayloadError> {
        let ack = AckState::decode(&packet.payload)?;
        if ack.is_ok() {
            debug!(src = %packet.source, "ack");
            if let Some(link) = self.link() {
                link.ack(packet.source);
            }
        } else {
            warn!(
                src = %packet.source,
                payload = %packet.payload_hex(),
                "device rejected the command (invalid command or argument)"
            );
        }
        Ok(())
    }

    fn on_time_request(&self, packet: &Packet) -> Result<(), PayloadError> {
        debug!(src = %packet.source, "time requested");
        self.emit(MaxEvent::DeviceRequestTimeInformation(packet.source));
        drop(self.send_time_information(packet.source, None));
        Ok(())
    }

    fn on_shutter_contact_state(&self, packet: &Packet) -> Result<(), PayloadError> {
        let state = ShutterContactState::decode(&packet.payload)?;
        self.emit(MaxEvent::ShutterContactStateReceived(Self::report(packet, state)));
        Ok(())
    }

    fn on_push_button_state(&self, packet: &Packet) -> Result<(), PayloadError> {
        let state = PushButtonState::decode(&packet.payload)?;
        self.emit(MaxEvent::PushButtonStateReceived(Self::report(packet, state)));
        Ok(())
    }

    fn on_wall_thermostat_state(&self, packet: &Packet) -> Result<(), PayloadError> {
        let state = WallThermostatState::decode(&packet.payload)?;
        self.emit(MaxEvent::WallThermostatStateReceived(Self::report(packet, state)));
        Ok(())
    }

    fn on_wall_thermostat_control(&self, packet: &Packet) -> Result<(), PayloadError> {
        let state = WallThermostatControl::decode(&packet.payload)?;
        self.emit(MaxEvent::WallThermostatControlReceived(Self::report(packet, state)));
        Ok(())
    }

    fn on_thermostat_state(&self, packet: &Packet) -> Result<(), PayloadError> {
        let state = ThermostatState::decode(&packet.payload)?;
        self.emit(MaxEvent::ThermostatStateReceived(Self::report(packet, state)));
        Ok(())
    }
}
