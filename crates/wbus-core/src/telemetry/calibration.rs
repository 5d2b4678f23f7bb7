//! Two-point linear calibration
//!
//! The heater reports analog sensors as raw bytes. Each channel is mapped to
//! its physical unit through a straight line fitted to two known points.

use serde::{Deserialize, Serialize};

/// A straight line through two (raw, physical) calibration points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCalibration {
    /// First calibration point: raw reading and its physical value
    pub p0: (f64, f64),
    /// Second calibration point
    pub p1: (f64, f64),
}

impl LinearCalibration {
    /// Create a calibration from two points; the raw values must differ
    pub const fn new(raw0: f64, phys0: f64, raw1: f64, phys1: f64) -> Self {
        Self {
            p0: (raw0, phys0),
            p1: (raw1, phys1),
        }
    }

    /// Physical units per raw count
    pub fn slope(&self) -> f64 {
        (self.p1.1 - self.p0.1) / (self.p1.0 - self.p0.0)
    }

    /// Physical value at raw = 0
    pub fn intercept(&self) -> f64 {
        self.p0.1 - self.slope() * self.p0.0
    }

    /// Map a raw reading to physical units
    pub fn apply(&self, raw: u8) -> f64 {
        self.slope() * raw as f64 + self.intercept()
    }
}

/// Coolant temperature, °C
pub const TEMPERATURE: LinearCalibration = LinearCalibration::new(186.0, 18.0, 71.0, 72.0);

/// Supply voltage, V
pub const VOLTAGE: LinearCalibration = LinearCalibration::new(195.0, 13.4, 180.0, 12.0);

/// Glowplug (flame detector) resistance, Ω
pub const GLOWPLUG_RESISTANCE: LinearCalibration = LinearCalibration::new(51.0, 0.8, 108.0, 1.1);
