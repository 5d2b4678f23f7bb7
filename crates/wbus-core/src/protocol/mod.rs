//! W-Bus Protocol Communication
//!
//! Implements the single-wire, half-duplex diagnostic bus used by Webasto
//! parking heaters: frame encoding with XOR checksum, wake pulses, and
//! echo-verified request/response transactions.

mod bus;
mod clock;
pub mod commands;
mod error;
mod frame;
pub mod serial;
mod transport;

pub use bus::{Bus, BusStats, BusTiming};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{ack_of, Command, StatusQuery, ACK_BIT};
pub use error::{BusError, FrameError, SerialError};
pub use frame::{xor_checksum, Address, Frame, FRAME_OVERHEAD};
pub(crate) use frame::hex;
pub use serial::{list_ports, open_port, open_transport, PortInfo, SerialConfig};
pub use transport::{SerialTransport, Transport};

/// Our id on the bus
pub const CLIENT_ID: u8 = 0x0f;

/// The heater's id on the bus
pub const HOST_ID: u8 = 0x04;

/// Normal bus bit rate
pub const DEFAULT_BAUD_RATE: u32 = 2400;

/// Bit rate used to stretch the wake pulse
pub const WAKE_BAUD_RATE: u32 = 300;

/// Byte sent at the wake rate; its start bit and seven zero bits form the low pulse
pub const WAKE_BYTE: u8 = 0x80;

/// Largest payload the length byte can describe
pub const MAX_PAYLOAD_SIZE: usize = 254;
