//! Heater control
//!
//! The session value, the command controller that creates and clears it, and
//! the keep-alive that extends it.

mod controller;
mod keep_alive;
mod session;

pub use controller::{CommandController, DEFAULT_ATTEMPTS};
pub use keep_alive::{KeepAlive, KeepAliveOutcome};
pub use session::{ActiveCommand, HeaterState, Session};
