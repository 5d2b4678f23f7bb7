//! Protocol errors

use thiserror::Error;

/// Reasons an inbound frame failed structural validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("address mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Address { expected: u8, actual: u8 },

    #[error("length byte mismatch: expected {expected:#04x}, got {actual:#04x}")]
    LengthByte { expected: u8, actual: u8 },

    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },
}

/// Errors that can occur during a bus transaction
///
/// Every variant is recoverable by retrying; none of them indicate that the
/// driver itself is in an unusable state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Our own transmission did not loop back verbatim (collision or wiring fault)
    #[error("echo mismatch: sent {sent:02x?}, read back {received:02x?}")]
    EchoMismatch { sent: Vec<u8>, received: Vec<u8> },

    /// The heater did not deliver a complete reply within the window
    #[error("reply timeout: expected {expected} bytes, got {received}")]
    ReplyTimeout { expected: usize, received: usize },

    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    /// The reply was well-formed but its content did not confirm the request
    #[error("not acknowledged: expected {expected:02x?}, got {actual:02x?}")]
    CommandNotAcknowledged { expected: Vec<u8>, actual: Vec<u8> },
}

/// Errors opening or configuring the physical serial port
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("Port not found: {0}")]
    PortNotFound(String),
}
