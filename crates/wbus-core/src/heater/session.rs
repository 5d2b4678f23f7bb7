//! Heating/ventilation session

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::Command;

/// Which on-command a session was started with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActiveCommand {
    Heat,
    Vent,
}

impl ActiveCommand {
    /// The wire command that starts (and renews) this mode
    pub fn command(&self) -> Command {
        match self {
            ActiveCommand::Heat => Command::HeatOn,
            ActiveCommand::Vent => Command::VentOn,
        }
    }
}

/// Externally visible heater mode, as far as this driver knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaterState {
    Off,
    Heating,
    Venting,
}

/// Active command and the time the heater was granted for it.
///
/// Only the command controller and the keep-alive scheduler change a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    active: Option<ActiveCommand>,
    remaining: Duration,
}

impl Session {
    /// No command running
    pub fn idle() -> Self {
        Self::default()
    }

    /// Session for a freshly confirmed on-command
    pub fn started(active: ActiveCommand, minutes: u8) -> Self {
        Self {
            active: Some(active),
            remaining: Duration::from_secs(minutes as u64 * 60),
        }
    }

    /// Session with an explicit remaining time
    pub fn with_remaining(active: ActiveCommand, remaining: Duration) -> Self {
        Self {
            active: Some(active),
            remaining,
        }
    }

    pub fn active(&self) -> Option<ActiveCommand> {
        self.active
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Granted time not yet used up by confirmed keep-alive periods
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn state(&self) -> HeaterState {
        match self.active {
            None => HeaterState::Off,
            Some(ActiveCommand::Heat) => HeaterState::Heating,
            Some(ActiveCommand::Vent) => HeaterState::Venting,
        }
    }

    /// Count one confirmed keep-alive period against the remaining time
    pub(crate) fn consume(&mut self, period: Duration) {
        self.remaining = self.remaining.saturating_sub(period);
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::idle();
    }
}
