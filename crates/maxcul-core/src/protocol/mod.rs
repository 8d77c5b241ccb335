//! CUL Serial Protocol
//!
//! Implements the CUL stick's line-oriented text protocol and the MAX! frame
//! format carried inside it.
//!
//! Inbound lines are either data frames (`Z...`), the firmware version
//! (`V...`), credit reports (`<credits> <aux>`) or the duty-cycle overflow
//! notice (`LOVF`). Outbound frames are sent as `Zs<hex>`, credit queries as
//! `X`.

pub mod commands;
mod error;
pub mod frame;
pub mod link;
mod packet;
pub mod serial;

pub use commands::CommandId;
pub use error::{FrameError, ProtocolError};
pub use frame::{parse_line, CreditReport, InboundLine};
pub use link::{Delivery, LinkDriver, LinkHandle, LinkStatus};
pub use packet::{Packet, PacketBuilder, PacketKind, PacketStatus};
pub use serial::{
    handshake, line_reader, list_ports, open_port, write_command, HandshakeOutcome,
    HandshakeTiming, PortInfo,
};

/// Default baud rate of a CUL stick
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// How long a sent frame waits for its ack, in milliseconds
pub const ACK_TIMEOUT_MS: u64 = 3000;

/// Retransmissions of an unacknowledged frame before it is given up
pub const MAX_SEND_RETRIES: u8 = 3;

/// Credit balance below which real commands are held back behind a credit query
pub const CREDIT_THRESHOLD: u32 = 220;

/// Flag bit asking the receiver for an ack
pub const FLAG_ACK_REQUESTED: u8 = 0x04;

/// Longest line accepted from the stick
pub const MAX_LINE_LENGTH: usize = 512;
