//! Inbound line parsing
//!
//! Classifies the text lines a CUL stick emits and parses `Z` data frames
//! into [`Packet`]s.

use super::packet::{decode_hex, HEADER_LEN};
use super::{FrameError, Packet, PacketKind, PacketStatus};
use crate::device::Address;

/// `Z` + length byte + header + RSSI byte, as hex characters
const MIN_FRAME_CHARS: usize = 1 + 2 + HEADER_LEN * 2 + 2;

/// Credit report line (`<credits> <aux>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditReport {
    /// Remaining duty-cycle budget
    pub credits: u32,
    /// Auxiliary counter reported alongside
    pub aux: u32,
}

impl CreditReport {
    /// Parse `<digits><whitespace><digits>`
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let first = parts.next()?;
        let second = parts.next()?;
        if parts.next().is_some() || !is_digits(first) || !is_digits(second) {
            return None;
        }
        Some(Self {
            credits: first.parse().ok()?,
            aux: second.parse().ok()?,
        })
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// A classified line from the stick
#[derive(Debug, Clone, PartialEq)]
pub enum InboundLine {
    /// Credit report
    Credits(CreditReport),
    /// Firmware version (`V 1.67 CUL868`)
    FirmwareVersion(String),
    /// Duty-cycle limit overflow notice
    LimitOverflow,
    /// MAX! data frame
    Frame(Packet),
    /// Anything else
    Unknown(String),
}

/// Classify one line received from the stick
pub fn parse_line(line: &str, base_address: Address) -> Result<InboundLine, FrameError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(FrameError::Empty);
    }

    if let Some(report) = CreditReport::parse(line) {
        return Ok(InboundLine::Credits(report));
    }
    if line.starts_with("LOVF") {
        return Ok(InboundLine::LimitOverflow);
    }
    if line.starts_with('V') {
        return Ok(InboundLine::FirmwareVersion(line.to_string()));
    }
    if line.starts_with('Z') {
        return parse_frame(line, base_address).map(InboundLine::Frame);
    }

    Ok(InboundLine::Unknown(line.to_string()))
}

/// Parse a `Z` data frame, RSSI byte included
pub fn parse_frame(line: &str, base_address: Address) -> Result<Packet, FrameError> {
    if line.len() < MIN_FRAME_CHARS || !line.is_ascii() {
        return Err(FrameError::Truncated { len: line.len() });
    }

    let declared = u8::from_str_radix(&line[1..3], 16)
        .map_err(|_| FrameError::InvalidHex(line[1..3].to_string()))?;
    if 2 * declared as usize + 3 != line.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: line.len(),
        });
    }

    let (body, rssi_hex) = line[3..].split_at(line.len() - 5);
    let rssi_raw = u8::from_str_radix(rssi_hex, 16)
        .map_err(|_| FrameError::InvalidHex(rssi_hex.to_string()))?;
    let bytes = decode_hex(body)?;

    Ok(Packet {
        // The declared length counts the RSSI byte, the packet does not
        length: declared - 1,
        counter: bytes[0],
        flags: bytes[1],
        command: bytes[2],
        source: Address::new([bytes[3], bytes[4], bytes[5]]),
        destination: Address::new([bytes[6], bytes[7], bytes[8]]),
        group: bytes[9],
        payload: bytes[HEADER_LEN..].to_vec(),
        rssi: Some(decode_rssi(rssi_raw)),
        status: PacketStatus::Incoming,
        send_tries: 0,
        device_type: None,
        for_me: Address::new([bytes[6], bytes[7], bytes[8]]) == base_address,
        kind: PacketKind::Frame,
    })
}

/// Convert the stick's RSSI byte to dBm
pub fn decode_rssi(raw: u8) -> f64 {
    let raw = f64::from(raw);
    if raw >= 128.0 {
        (raw - 256.0) / 2.0 - 74.0
    } else {
        raw / 2.0 - 74.0
    }
}
