//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the CUL stick
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected to CUL")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Link to CUL closed")]
    LinkClosed,

    #[error("Packet {raw} sent but no response!")]
    NoResponse { raw: String },

    #[error("Packet {raw} could not be sent! {source}")]
    SendFailed {
        raw: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Reasons an inbound line is not a usable MAX! frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty line")]
    Empty,

    #[error("cannot split packet: {len} characters is too short")]
    Truncated { len: usize },

    #[error("packet length mismatch: declared {declared} bytes, line has {actual} characters")]
    LengthMismatch { declared: u8, actual: usize },

    #[error("invalid hex in frame: {0}")]
    InvalidHex(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_delivery_errors_name_the_packet() {
        let raw = "0b0100401234560a1b2c006b".to_string();
        assert_eq!(
            ProtocolError::NoResponse { raw: raw.clone() }.to_string(),
            "Packet 0b0100401234560a1b2c006b sent but no response!"
        );

        let err = ProtocolError::SendFailed {
            raw,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"),
        };
        assert_eq!(
            err.to_string(),
            "Packet 0b0100401234560a1b2c006b could not be sent! unplugged"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
