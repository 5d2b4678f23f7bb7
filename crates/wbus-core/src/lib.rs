//! # W-Bus Core Library
//!
//! Client driver for the single-wire W-Bus diagnostic bus of Webasto parking
//! heaters.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame encoding and validation with XOR checksums
//! - Wake-up sequencing and echo-verified request/response over a shared wire
//! - Heating, ventilation and off commands with a retry budget
//! - Session keep-alive and renewal
//! - Telemetry polling and decoding into engineering units
//! - A simulated heater for tests and demos
//!
//! ## Example
//!
//! ```rust,ignore
//! use wbus_core::{config::DriverConfig, driver::HeaterDriver};
//!
//! let config = DriverConfig::from_file("wbus.json")?;
//! let mut heater = HeaterDriver::open(&config)?;
//!
//! heater.heat_on(Some(30))?;
//! loop {
//!     heater.tick();
//!     println!("{:+.1} C", heater.sensors().temperature_c);
//! }
//! ```

pub mod config;
pub mod driver;
pub mod heater;
pub mod protocol;
pub mod scheduler;
pub mod sim;
pub mod telemetry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, DriverConfig};
    pub use crate::driver::{HeaterDriver, Snapshot, TickOutcome};
    pub use crate::heater::{ActiveCommand, HeaterState, KeepAliveOutcome, Session};
    pub use crate::protocol::{
        BusError, BusStats, Clock, ManualClock, SerialConfig, SerialTransport, StatusQuery,
        SystemClock, Transport,
    };
    pub use crate::sim::SimulatedHeater;
    pub use crate::telemetry::{
        Counters, DriveLevels, OperatingFlags, OperatingState, SensorReadings, Telemetry,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
