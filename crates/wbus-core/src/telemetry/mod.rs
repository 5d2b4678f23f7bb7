//! Heater telemetry
//!
//! Typed snapshots of the five status register blocks and the formulas that
//! turn raw reply bytes into engineering units. Every decoder takes the full
//! reply payload, i.e. starting with the acknowledged query code `0xD0` and
//! the block index.

pub mod calibration;
mod poller;

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

pub use calibration::LinearCalibration;
pub use poller::{poll, QueryDescriptor, QUERIES};

/// Reply of query 0x50 0x03: one bitfield byte
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperatingFlags {
    pub heat_request: bool,
    pub vent_request: bool,
    pub unknown_bit2: bool,
    pub unknown_bit3: bool,
    pub combustion_fan: bool,
    pub glowplug: bool,
    pub fuel_pump: bool,
    pub nozzle_heating: bool,
}

impl OperatingFlags {
    /// Reply payload length
    pub const REPLY_LEN: usize = 3;

    /// Split a bitfield byte, bit 0 = heat request ... bit 7 = nozzle heating
    pub fn from_bits(bits: u8) -> Self {
        let bit = |n: u8| bits & (1 << n) != 0;
        Self {
            heat_request: bit(0),
            vent_request: bit(1),
            unknown_bit2: bit(2),
            unknown_bit3: bit(3),
            combustion_fan: bit(4),
            glowplug: bit(5),
            fuel_pump: bit(6),
            nozzle_heating: bit(7),
        }
    }

    /// Reassemble the bitfield byte
    pub fn bits(&self) -> u8 {
        [
            self.heat_request,
            self.vent_request,
            self.unknown_bit2,
            self.unknown_bit3,
            self.combustion_fan,
            self.glowplug,
            self.fuel_pump,
            self.nozzle_heating,
        ]
        .iter()
        .enumerate()
        .fold(0u8, |acc, (n, on)| if *on { acc | (1 << n) } else { acc })
    }

    pub fn decode(reply: &[u8]) -> Option<Self> {
        reply.get(2).map(|b| Self::from_bits(*b))
    }
}

/// Reply of query 0x50 0x04: actuator drive levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DriveLevels {
    /// Glowplug drive, 0-100 %
    pub glowplug_percent: f64,
    /// Fuel pump frequency, 0-5 Hz
    pub fuel_pump_hz: f64,
    /// Combustion fan drive, 0-200 %
    pub combustion_fan_percent: f64,
}

impl DriveLevels {
    pub const REPLY_LEN: usize = 10;

    /// Bytes 6, 7 and 8 of the reply carry the levels; the rest are not decoded
    pub fn decode(reply: &[u8]) -> Option<Self> {
        let raw = reply.get(6..9)?;
        Some(Self {
            glowplug_percent: raw[0] as f64,
            fuel_pump_hz: raw[1] as f64 * 2.0 / 100.0,
            combustion_fan_percent: raw[2] as f64,
        })
    }
}

/// Reply of query 0x50 0x05: analog sensors
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReadings {
    pub temperature_c: f64,
    pub voltage_v: f64,
    /// Zero whenever the raw reading is zero
    pub glowplug_resistance_ohm: f64,
}

impl SensorReadings {
    pub const REPLY_LEN: usize = 5;

    pub fn decode(reply: &[u8]) -> Option<Self> {
        let raw = reply.get(2..5)?;
        let resistance = match raw[2] {
            0 => 0.0,
            r => calibration::GLOWPLUG_RESISTANCE.apply(r),
        };
        Some(Self {
            temperature_c: calibration::TEMPERATURE.apply(raw[0]),
            voltage_v: calibration::VOLTAGE.apply(raw[1]),
            glowplug_resistance_ohm: resistance,
        })
    }
}

/// Reply of query 0x50 0x06: lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Counters {
    pub working_hours: f64,
    pub operating_hours: f64,
    pub start_counter: u16,
}

impl Counters {
    pub const REPLY_LEN: usize = 10;

    /// Two (hours big-endian u16, minutes u8) triples followed by a big-endian start count
    pub fn decode(reply: &[u8]) -> Option<Self> {
        let raw = reply.get(2..10)?;
        Some(Self {
            working_hours: hours_minutes(&raw[0..3]),
            operating_hours: hours_minutes(&raw[3..6]),
            start_counter: BigEndian::read_u16(&raw[6..8]),
        })
    }
}

fn hours_minutes(raw: &[u8]) -> f64 {
    BigEndian::read_u16(&raw[0..2]) as f64 + raw[2] as f64 / 60.0
}

/// Reply of query 0x50 0x07: opaque operating state code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperatingState {
    pub code: u8,
}

impl OperatingState {
    pub const REPLY_LEN: usize = 6;

    pub fn decode(reply: &[u8]) -> Option<Self> {
        reply.get(2).map(|code| Self { code: *code })
    }
}

/// Last good value of every status block.
///
/// Each field is replaced as a whole when its query succeeds and left
/// untouched otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Telemetry {
    pub flags: OperatingFlags,
    pub drive_levels: DriveLevels,
    pub sensors: SensorReadings,
    pub counters: Counters,
    pub operating_state: OperatingState,
}
