//! Command controller
//!
//! Turns the heater on (heating or ventilation) and off. Every command gets
//! the same retry shape: wake if needed, transact, require the acknowledged
//! reply, up to `attempts` times. Only a confirmed reply changes the session.

use tracing::{info, warn};

use super::session::{ActiveCommand, Session};
use crate::protocol::{Bus, BusError, Clock, Command, Transport};

/// Default retry budget for commands and keep-alive checks
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Retrying front end for the heater's control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandController {
    attempts: u32,
}

impl Default for CommandController {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS)
    }
}

impl CommandController {
    /// Controller with the given attempt budget (at least one attempt is made)
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run one command with retries and return the confirmed reply
    fn send<T: Transport, C: Clock>(
        &self,
        bus: &mut Bus<T, C>,
        name: &str,
        payload: &[u8],
        reply_len: usize,
        expected: &[u8],
    ) -> Result<Vec<u8>, BusError> {
        let mut last_err = None;
        for attempt in 1..=self.attempts {
            match bus.request(payload, reply_len, expected) {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    warn!("{} attempt {}/{} failed: {}", name, attempt, self.attempts, e);
                    last_err = Some(e);
                }
            }
        }
        warn!("{} gave up after {} attempts", name, self.attempts);
        // attempts >= 1, so an error was recorded
        Err(last_err.unwrap_or(BusError::ReplyTimeout {
            expected: reply_len,
            received: 0,
        }))
    }

    /// Start heating or ventilation for `minutes`.
    ///
    /// The reply must carry the acknowledged command code and echo `minutes`
    /// exactly. On failure `session` is left as it was.
    pub fn switch_on<T: Transport, C: Clock>(
        &self,
        bus: &mut Bus<T, C>,
        session: &mut Session,
        active: ActiveCommand,
        minutes: u8,
    ) -> Result<(), BusError> {
        let command = active.command();
        self.send(
            bus,
            command.name(),
            &command.payload(minutes),
            command.reply_len(),
            &[command.ack(), minutes],
        )?;
        *session = Session::started(active, minutes);
        info!("{} confirmed for {} min", command.name(), minutes);
        Ok(())
    }

    /// Switch the heater off; clears `session` once confirmed
    pub fn off<T: Transport, C: Clock>(
        &self,
        bus: &mut Bus<T, C>,
        session: &mut Session,
    ) -> Result<(), BusError> {
        let command = Command::Off;
        self.send(
            bus,
            command.name(),
            &command.payload(0),
            command.reply_len(),
            &[command.ack()],
        )?;
        session.clear();
        info!("heater off");
        Ok(())
    }

    /// Liveness check for the running command
    pub fn check<T: Transport, C: Clock>(
        &self,
        bus: &mut Bus<T, C>,
        active: ActiveCommand,
    ) -> Result<(), BusError> {
        let command = Command::Check;
        self.send(
            bus,
            command.name(),
            &command.payload(active.command().code()),
            command.reply_len(),
            &[command.ack()],
        )
        .map(|_| ())
    }
}
