//! Packet model and serialization
//!
//! MAX! frame layout (all fields hex-encoded on the wire):
//! - 1 byte: Length of everything that follows
//! - 1 byte: Message counter
//! - 1 byte: Flags (bit 2 = ack requested)
//! - 1 byte: Command id
//! - 3 bytes: Source address
//! - 3 bytes: Destination address
//! - 1 byte: Group id
//! - N bytes: Payload
//!
//! Inbound frames carry one extra RSSI byte that is not part of the packet.

use std::fmt::Write as _;

use super::{CommandId, FrameError, FLAG_ACK_REQUESTED};
use crate::device::{Address, DeviceType};
use crate::payload::{self, Payload, PayloadError};

/// Bytes of header between the length byte and the payload
pub const HEADER_LEN: usize = 10;

/// What the link driver does with a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// A MAX! radio frame, sent as `Zs<hex>` and acknowledged by the device
    Frame,
    /// A credit query (`X`) answered by the stick itself
    CreditQuery,
}

/// Lifecycle of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// Built, not yet handed to the stick
    New,
    /// Written at least once, waiting for the outcome
    Sent,
    /// Acknowledged (or resolved without an ack)
    Acked,
    /// Given up
    Rejected,
    /// Parsed from an inbound line
    Incoming,
}

/// A MAX! protocol packet
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Byte length of counter..payload
    pub length: u8,
    /// Message counter
    pub counter: u8,
    /// Flags byte
    pub flags: u8,
    /// Raw command id
    pub command: u8,
    /// Sender address
    pub source: Address,
    /// Receiver address
    pub destination: Address,
    /// Group id
    pub group: u8,
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Signal strength in dBm (inbound only)
    pub rssi: Option<f64>,
    /// Lifecycle status
    pub status: PacketStatus,
    /// Retransmissions so far
    pub send_tries: u8,
    /// Class of the addressed device, used for queue priority
    pub device_type: Option<DeviceType>,
    /// Destination equals this controller's base address
    pub for_me: bool,
    /// Frame or credit query
    pub kind: PacketKind,
}

impl Packet {
    /// A credit query packet
    pub fn credit_query() -> Self {
        Self {
            length: 0,
            counter: 0,
            flags: 0,
            command: 0,
            source: Address::BROADCAST,
            destination: Address::BROADCAST,
            group: 0,
            payload: Vec::new(),
            rssi: None,
            status: PacketStatus::New,
            send_tries: 0,
            device_type: None,
            for_me: false,
            kind: PacketKind::CreditQuery,
        }
    }

    /// Decoded command id, if known
    pub fn command_id(&self) -> Option<CommandId> {
        CommandId::from_u8(self.command)
    }

    /// Byte length of counter..payload
    pub fn body_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Whether the sender asked for an ack
    pub fn ack_requested(&self) -> bool {
        self.flags & FLAG_ACK_REQUESTED != 0
    }

    /// Whether this is a credit query
    pub fn is_credit_query(&self) -> bool {
        self.kind == PacketKind::CreditQuery
    }

    /// Time sync broadcasts are best effort: they resolve even without an ack
    pub fn is_time_broadcast(&self) -> bool {
        self.kind == PacketKind::Frame
            && self.command == CommandId::TimeInformation.as_u8()
            && self.destination.is_broadcast()
    }

    /// Payload as lowercase hex
    pub fn payload_hex(&self) -> String {
        encode_hex(&self.payload)
    }

    /// Serialize to wire hex: length, counter, flags, cmd, src, dst, group, payload
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(2 + self.body_len() * 2);
        let _ = write!(
            out,
            "{:02x}{:02x}{:02x}{:02x}{}{}{:02x}",
            self.body_len() as u8,
            self.counter,
            self.flags,
            self.command,
            self.source,
            self.destination,
            self.group
        );
        out.push_str(&self.payload_hex());
        out
    }

    /// Line handed to the stick
    pub fn wire_line(&self) -> String {
        match self.kind {
            PacketKind::CreditQuery => "X\n".to_string(),
            PacketKind::Frame => format!("Zs{}\n", self.to_hex()),
        }
    }

    /// Run the payload codec for this packet's command
    pub fn decode_payload(&self) -> Result<Option<Payload>, PayloadError> {
        match self.command_id() {
            Some(command) => payload::decode(command, &self.payload),
            None => Ok(None),
        }
    }
}

/// Builder for outbound packets
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    command: CommandId,
    source: Address,
    destination: Address,
    group: u8,
    flags: u8,
    payload: Vec<u8>,
    device_type: Option<DeviceType>,
}

impl PacketBuilder {
    /// Start a packet for the given command
    pub fn new(command: CommandId) -> Self {
        Self {
            command,
            source: Address::BROADCAST,
            destination: Address::BROADCAST,
            group: 0,
            flags: 0,
            payload: Vec::new(),
            device_type: None,
        }
    }

    /// Sender address
    pub fn source(mut self, source: Address) -> Self {
        self.source = source;
        self
    }

    /// Receiver address
    pub fn destination(mut self, destination: Address) -> Self {
        self.destination = destination;
        self
    }

    /// Group id
    pub fn group(mut self, group: u8) -> Self {
        self.group = group;
        self
    }

    /// Flags byte
    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Raw payload
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Class of the receiving device
    pub fn device_type(mut self, device_type: Option<DeviceType>) -> Self {
        self.device_type = device_type;
        self
    }

    /// Command this builder will produce
    pub fn command(&self) -> CommandId {
        self.command
    }

    /// Build the packet with the given message counter
    pub fn build(self, counter: u8) -> Packet {
        let length = (HEADER_LEN + self.payload.len()) as u8;
        Packet {
            length,
            counter,
            flags: self.flags,
            command: self.command.as_u8(),
            source: self.source,
            destination: self.destination,
            group: self.group,
            payload: self.payload,
            rssi: None,
            status: PacketStatus::New,
            send_tries: 0,
            device_type: self.device_type,
            for_me: false,
            kind: PacketKind::Frame,
        }
    }
}

/// Lowercase hex of a byte slice
pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// Decode an even-length hex string
pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, FrameError> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(FrameError::InvalidHex(s.to_string()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| FrameError::InvalidHex(s.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_builder_computes_length() {
        let packet = PacketBuilder::new(CommandId::SetTemperature)
            .source(addr("123456"))
            .destination(addr("0a1b2c"))
            .payload(vec![0xEC])
            .build(1);
        assert_eq!(packet.length, 11);
        assert_eq!(packet.body_len(), 11);
        assert_eq!(packet.status, PacketStatus::New);
    }

    #[test]
    fn test_to_hex() {
        let packet = PacketBuilder::new(CommandId::PairPong)
            .source(addr("123456"))
            .destination(addr("160BD0"))
            .payload(vec![0x00])
            .build(1);
        assert_eq!(packet.to_hex(), "0b010001123456160bd00000");
        assert_eq!(packet.wire_line(), "Zs0b010001123456160bd00000\n");
    }

    #[test]
    fn test_credit_query_wire_line() {
        let packet = Packet::credit_query();
        assert!(packet.is_credit_query());
        assert_eq!(packet.wire_line(), "X\n");
    }

    #[test]
    fn test_time_broadcast_detection() {
        let broadcast = PacketBuilder::new(CommandId::TimeInformation)
            .source(addr("123456"))
            .destination(Address::BROADCAST)
            .build(1);
        assert!(broadcast.is_time_broadcast());

        let unicast = PacketBuilder::new(CommandId::TimeInformation)
            .source(addr("123456"))
            .destination(addr("160bd0"))
            .build(1);
        assert!(!unicast.is_time_broadcast());

        assert!(!Packet::credit_query().is_time_broadcast());
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(encode_hex(&[0x00, 0xAB, 0x10]), "00ab10");
        assert_eq!(decode_hex("00Ab10").unwrap(), vec![0x00, 0xAB, 0x10]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }
}
