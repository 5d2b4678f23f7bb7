//! Heater driver
//!
//! The single entry point a host talks to. It owns the bus, the session, the
//! telemetry snapshots and the task schedule. The host calls [`HeaterDriver::tick`]
//! at a steady cadence; each tick runs at most one periodic task to completion
//! and then discards any stray bytes left on the wire.
//!
//! A driver instance is not shareable: calls must come from one caller at a
//! time, which `&mut self` on every operation enforces.

use serde::Serialize;
use tracing::debug;

use crate::config::DriverConfig;
use crate::heater::{
    ActiveCommand, CommandController, HeaterState, KeepAlive, KeepAliveOutcome, Session,
};
use crate::protocol::{
    hex, open_transport, Bus, BusError, BusStats, Clock, SerialError, SerialTransport,
    StatusQuery, SystemClock, Transport,
};
use crate::scheduler::{Scheduler, Task};
use crate::telemetry::{
    self, Counters, DriveLevels, OperatingFlags, OperatingState, QueryDescriptor, SensorReadings,
    Telemetry,
};

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The slot under the cursor was not due
    Idle,
    /// A keep-alive round ran
    KeepAlive(KeepAliveOutcome),
    /// A status query ran; `updated` is false if its snapshot was left as is
    Polled { query: StatusQuery, updated: bool },
}

/// Everything the driver knows, for display or export
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Snapshot {
    pub state: HeaterState,
    pub remaining_secs: u64,
    pub telemetry: Telemetry,
    pub stats: BusStats,
}

/// W-Bus client for one heater
pub struct HeaterDriver<T, C> {
    bus: Bus<T, C>,
    session: Session,
    telemetry: Telemetry,
    scheduler: Scheduler,
    controller: CommandController,
    keep_alive: KeepAlive,
    default_minutes: u8,
}

impl HeaterDriver<SerialTransport, SystemClock> {
    /// Open the configured serial port and build a driver on it
    pub fn open(config: &DriverConfig) -> Result<Self, SerialError> {
        let transport = open_transport(&config.serial)?;
        Ok(Self::new(transport, SystemClock::new(), config))
    }
}

impl<T: Transport, C: Clock> HeaterDriver<T, C> {
    pub fn new(transport: T, clock: C, config: &DriverConfig) -> Self {
        let scheduler = Scheduler::with_periods(config.keep_alive().period, |q| {
            config.query_period(q)
        });
        Self {
            bus: Bus::new(transport, clock, config.bus_timing()),
            session: Session::idle(),
            telemetry: Telemetry::default(),
            scheduler,
            controller: CommandController::new(config.command_attempts),
            keep_alive: config.keep_alive(),
            default_minutes: config.default_minutes,
        }
    }

    /// Run the next due task, then drain stray bytes
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.bus.now();
        let outcome = match self.scheduler.next(now) {
            None => TickOutcome::Idle,
            Some(Task::KeepAlive) => TickOutcome::KeepAlive(self.keep_alive.run(
                &self.controller,
                &mut self.bus,
                &mut self.session,
            )),
            Some(Task::Query(query)) => {
                let desc = QueryDescriptor::of(query);
                let updated = telemetry::poll(&mut self.bus, desc, &mut self.telemetry).is_ok();
                TickOutcome::Polled { query, updated }
            }
        };

        let stray = self.bus.drain_stray();
        if !stray.is_empty() {
            debug!("drained {} stray bytes: {}", stray.len(), hex(&stray));
        }
        outcome
    }

    /// Start heating; `None` uses the configured default duration
    pub fn heat_on(&mut self, minutes: Option<u8>) -> Result<(), BusError> {
        self.switch_on(ActiveCommand::Heat, minutes)
    }

    /// Start ventilation; `None` uses the configured default duration
    pub fn vent_on(&mut self, minutes: Option<u8>) -> Result<(), BusError> {
        self.switch_on(ActiveCommand::Vent, minutes)
    }

    fn switch_on(&mut self, active: ActiveCommand, minutes: Option<u8>) -> Result<(), BusError> {
        let minutes = minutes.unwrap_or(self.default_minutes);
        self.controller
            .switch_on(&mut self.bus, &mut self.session, active, minutes)
    }

    pub fn off(&mut self) -> Result<(), BusError> {
        self.controller.off(&mut self.bus, &mut self.session)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> HeaterState {
        self.session.state()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn flags(&self) -> &OperatingFlags {
        &self.telemetry.flags
    }

    pub fn drive_levels(&self) -> &DriveLevels {
        &self.telemetry.drive_levels
    }

    pub fn sensors(&self) -> &SensorReadings {
        &self.telemetry.sensors
    }

    pub fn counters(&self) -> &Counters {
        &self.telemetry.counters
    }

    pub fn operating_state(&self) -> &OperatingState {
        &self.telemetry.operating_state
    }

    pub fn stats(&self) -> &BusStats {
        self.bus.stats()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state(),
            remaining_secs: self.session.remaining().as_secs(),
            telemetry: self.telemetry,
            stats: *self.bus.stats(),
        }
    }

    pub fn clock(&self) -> &C {
        self.bus.clock()
    }

    pub fn transport(&self) -> &T {
        self.bus.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.bus.transport_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ManualClock;
    use crate::sim::SimulatedHeater;
    use pretty_assertions::assert_eq;

    fn driver() -> HeaterDriver<SimulatedHeater, ManualClock> {
        HeaterDriver::new(
            SimulatedHeater::new(),
            ManualClock::new(),
            &DriverConfig::default(),
        )
    }

    #[test]
    fn test_default_minutes() {
        let mut d = driver();
        d.vent_on(None).expect("vent on");
        assert_eq!(d.state(), HeaterState::Venting);
        assert_eq!(d.transport().requests(), &[vec![0x22, 0x01]]);
    }

    #[test]
    fn test_tick_drains_stray_bytes() {
        let mut d = driver();
        d.transport_mut().inject(&[0x4f, 0x03]);
        // slot 0 is keep-alive with no session: nothing sent
        assert_eq!(d.tick(), TickOutcome::KeepAlive(KeepAliveOutcome::Idle));
        assert_eq!(d.stats().stray_bytes, 2);
        assert_eq!(d.stats().frames_sent, 0);
    }

    #[test]
    fn test_snapshot_reflects_session() {
        let mut d = driver();
        d.heat_on(Some(20)).expect("heat on");
        let snap = d.snapshot();
        assert_eq!(snap.state, HeaterState::Heating);
        assert_eq!(snap.remaining_secs, 1200);
        assert_eq!(snap.stats.round_trips, 1);
    }
}
