//! Keep-alive for a running heating/ventilation session
//!
//! Each period the running command is checked. A confirmed check counts the
//! period against the session's remaining time. Once the remaining time drops
//! below the renewal threshold the running on-command is sent again, before
//! the heater's own timer switches it off.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::controller::CommandController;
use super::session::Session;
use crate::protocol::{Bus, Clock, Transport};

/// What a keep-alive round did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveOutcome {
    /// No session running, nothing sent
    Idle,
    /// Check confirmed, no renewal needed yet
    Confirmed,
    /// Check failed within the retry budget; session left unchanged
    CheckFailed,
    /// Session renewed with a fresh grant
    Renewed,
    /// Renewal failed; the session still has time left
    RenewalFailed,
    /// Renewal failed with no time left; session cleared
    Expired,
}

/// Keep-alive parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    /// Interval between rounds; also the amount a confirmed check consumes
    pub period: Duration,
    /// Renew once the remaining time is below this
    pub renewal_threshold: Duration,
    /// Minutes requested when renewing
    pub renewal_minutes: u8,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
            renewal_threshold: Duration::from_secs(30),
            renewal_minutes: 1,
        }
    }
}

impl KeepAlive {
    /// Run one keep-alive round against `session`
    pub fn run<T: Transport, C: Clock>(
        &self,
        controller: &CommandController,
        bus: &mut Bus<T, C>,
        session: &mut Session,
    ) -> KeepAliveOutcome {
        let Some(active) = session.active() else {
            return KeepAliveOutcome::Idle;
        };

        let mut checked = false;
        if !session.remaining().is_zero() {
            debug!("keep-alive check, {}s remaining", session.remaining().as_secs());
            match controller.check(bus, active) {
                Ok(()) => {
                    session.consume(self.period);
                    checked = true;
                }
                Err(e) => warn!("keep-alive check failed: {}", e),
            }
        }

        if session.remaining() >= self.renewal_threshold {
            return if checked {
                KeepAliveOutcome::Confirmed
            } else {
                KeepAliveOutcome::CheckFailed
            };
        }

        debug!(
            "renewing {:?} with {} min, {}s remaining",
            active,
            self.renewal_minutes,
            session.remaining().as_secs()
        );
        match controller.switch_on(bus, session, active, self.renewal_minutes) {
            Ok(()) => {
                info!("session renewed for {} min", self.renewal_minutes);
                KeepAliveOutcome::Renewed
            }
            Err(_) if session.remaining().is_zero() => {
                info!("session expired, renewal failed");
                session.clear();
                KeepAliveOutcome::Expired
            }
            Err(_) => KeepAliveOutcome::RenewalFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heater::{ActiveCommand, HeaterState};
    use crate::protocol::{BusTiming, ManualClock};
    use crate::sim::SimulatedHeater;
    use pretty_assertions::assert_eq;

    fn bus() -> Bus<SimulatedHeater, ManualClock> {
        Bus::new(SimulatedHeater::new(), ManualClock::new(), BusTiming::default())
    }

    fn round(
        bus: &mut Bus<SimulatedHeater, ManualClock>,
        session: &mut Session,
    ) -> KeepAliveOutcome {
        KeepAlive::default().run(&CommandController::default(), bus, session)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_idle_sends_nothing() {
        let mut bus = bus();
        let mut session = Session::idle();
        let outcome = round(&mut bus, &mut session);
        assert_eq!(outcome, KeepAliveOutcome::Idle);
        assert!(bus.transport().requests().is_empty());
        assert_eq!(bus.stats().frames_sent, 0);
    }

    #[test]
    fn test_confirmed_check_consumes_period() {
        let mut bus = bus();
        let mut session = Session::started(ActiveCommand::Heat, 2);
        let outcome = round(&mut bus, &mut session);
        assert_eq!(outcome, KeepAliveOutcome::Confirmed);
        assert_eq!(session.remaining(), secs(110));
    }

    #[test]
    fn test_renewal_below_threshold() {
        let mut bus = bus();
        let mut session = Session::with_remaining(ActiveCommand::Heat, secs(25));
        let outcome = round(&mut bus, &mut session);
        assert_eq!(outcome, KeepAliveOutcome::Renewed);
        assert_eq!(session.remaining(), secs(60));
        assert_eq!(session.state(), HeaterState::Heating);
        assert_eq!(
            bus.transport().requests(),
            &[vec![0x44, 0x21, 0x00], vec![0x21, 0x01]]
        );
    }

    #[test]
    fn test_failed_check_leaves_remaining_unchanged() {
        let mut bus = bus();
        bus.transport_mut().faults_mut().drop_replies = 3;
        let mut session = Session::with_remaining(ActiveCommand::Vent, secs(45));
        let outcome = round(&mut bus, &mut session);
        assert_eq!(outcome, KeepAliveOutcome::CheckFailed);
        assert_eq!(session.remaining(), secs(45));
        assert!(session.is_active());
    }

    #[test]
    fn test_failed_renewal_with_time_left() {
        let mut bus = bus();
        // check succeeds, all three renewal attempts are refused
        bus.transport_mut()
            .faults_mut()
            .reply_overrides
            .extend([vec![0xc4, 0x00], vec![0x21, 1], vec![0x21, 1], vec![0x21, 1]]);
        let mut session = Session::with_remaining(ActiveCommand::Heat, secs(25));
        let outcome = round(&mut bus, &mut session);
        assert_eq!(outcome, KeepAliveOutcome::RenewalFailed);
        assert_eq!(session.remaining(), secs(15));
        assert!(session.is_active());
    }

    #[test]
    fn test_expiry_when_nothing_left() {
        let mut bus = bus();
        bus.transport_mut().faults_mut().disconnected = true;
        let mut session = Session::with_remaining(ActiveCommand::Heat, Duration::ZERO);
        let outcome = round(&mut bus, &mut session);
        assert_eq!(outcome, KeepAliveOutcome::Expired);
        assert_eq!(session, Session::idle());
    }
}
