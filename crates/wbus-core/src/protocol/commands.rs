//! Protocol commands
//!
//! Defines the subset of W-Bus commands and status queries used for heater control.

use serde::{Deserialize, Serialize};

/// Bit set in the first reply byte when the heater acknowledges a request
pub const ACK_BIT: u8 = 0x80;

/// Status query prefix; the second byte selects the register block
pub const STATUS_QUERY: u8 = 0x50;

/// Expected first reply byte for a request starting with `code`
pub const fn ack_of(code: u8) -> u8 {
    code | ACK_BIT
}

/// Control commands understood by the heater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Switch off (no arguments)
    Off,

    /// Parking heating for N minutes
    HeatOn,

    /// Ventilation for N minutes
    VentOn,

    /// Liveness check of the currently running command
    Check,
}

impl Command {
    /// Get the command byte
    pub fn code(&self) -> u8 {
        match self {
            Command::Off => 0x10,
            Command::HeatOn => 0x21,
            Command::VentOn => 0x22,
            Command::Check => 0x44,
        }
    }

    /// Reply byte confirming this command
    pub fn ack(&self) -> u8 {
        ack_of(self.code())
    }

    /// Number of payload bytes the heater answers with
    pub fn reply_len(&self) -> usize {
        match self {
            Command::Off => 1,
            Command::HeatOn | Command::VentOn | Command::Check => 2,
        }
    }

    /// Short label used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Off => "off",
            Command::HeatOn => "heat_on",
            Command::VentOn => "vent_on",
            Command::Check => "check",
        }
    }

    /// Build the request payload; `arg` is minutes for on-commands and the
    /// checked command code for `Check`, ignored for `Off`
    pub fn payload(&self, arg: u8) -> Vec<u8> {
        match self {
            Command::Off => vec![self.code()],
            Command::HeatOn | Command::VentOn => vec![self.code(), arg],
            Command::Check => vec![self.code(), arg, 0x00],
        }
    }
}

/// Status register blocks polled for telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusQuery {
    /// 0x50 0x03: operating flags bitfield
    Flags,
    /// 0x50 0x04: actuator drive levels
    DriveLevels,
    /// 0x50 0x05: temperature, voltage, glowplug resistance
    Sensors,
    /// 0x50 0x06: hour and start counters
    Counters,
    /// 0x50 0x07: operating state code
    OperatingState,
}

impl StatusQuery {
    /// All queries in polling order
    pub const ALL: [StatusQuery; 5] = [
        StatusQuery::Flags,
        StatusQuery::DriveLevels,
        StatusQuery::Sensors,
        StatusQuery::Counters,
        StatusQuery::OperatingState,
    ];

    /// Register block index (second query byte)
    pub fn index(&self) -> u8 {
        match self {
            StatusQuery::Flags => 0x03,
            StatusQuery::DriveLevels => 0x04,
            StatusQuery::Sensors => 0x05,
            StatusQuery::Counters => 0x06,
            StatusQuery::OperatingState => 0x07,
        }
    }

    /// Two-byte query payload
    pub fn payload(&self) -> [u8; 2] {
        [STATUS_QUERY, self.index()]
    }

    /// Combined 16-bit code as written in documentation (e.g. 0x5003)
    pub fn code(&self) -> u16 {
        u16::from_be_bytes(self.payload())
    }

    /// Short label used in logs
    pub fn name(&self) -> &'static str {
        match self {
            StatusQuery::Flags => "flags",
            StatusQuery::DriveLevels => "drive_levels",
            StatusQuery::Sensors => "sensors",
            StatusQuery::Counters => "counters",
            StatusQuery::OperatingState => "operating_state",
        }
    }
}
