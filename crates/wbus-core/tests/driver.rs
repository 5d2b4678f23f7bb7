use std::time::Duration;
use wbus_core::prelude::*;
use wbus_core::scheduler::Task;

fn driver() -> (HeaterDriver<SimulatedHeater, ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let driver = HeaterDriver::new(
        SimulatedHeater::new(),
        clock.clone(),
        &DriverConfig::default(),
    );
    (driver, clock)
}

/// Run one full lap of the round-robin
fn lap<T: Transport, C: Clock>(driver: &mut HeaterDriver<T, C>) -> Vec<TickOutcome> {
    (0..Task::ALL.len()).map(|_| driver.tick()).collect()
}

#[test]
fn test_heat_on_confirmed() {
    let (mut d, _) = driver();
    d.heat_on(Some(5)).expect("heat on");
    assert_eq!(d.state(), HeaterState::Heating);
    assert_eq!(d.session().remaining(), Duration::from_secs(300));
    assert_eq!(d.transport().state(), HeaterState::Heating);
}

#[test]
fn test_refused_heat_on_leaves_state_unchanged() {
    let (mut d, _) = driver();
    d.transport_mut()
        .faults_mut()
        .reply_overrides
        .extend([vec![0x21, 5], vec![0x21, 5], vec![0x21, 5]]);
    let err = d.heat_on(Some(5)).unwrap_err();
    assert!(matches!(err, BusError::CommandNotAcknowledged { .. }));
    assert_eq!(d.state(), HeaterState::Off);
    assert_eq!(d.transport().requests().len(), 3);
}

#[test]
fn test_off_clears_session() {
    let (mut d, _) = driver();
    d.vent_on(Some(10)).expect("vent on");
    d.off().expect("off");
    assert_eq!(d.state(), HeaterState::Off);
    assert_eq!(*d.session(), Session::idle());
    assert_eq!(d.transport().state(), HeaterState::Off);
}

#[test]
fn test_first_lap_polls_every_block() {
    let (mut d, _) = driver();
    {
        let regs = d.transport_mut().registers_mut();
        regs.flags = 0b0011_0001;
        regs.drive_levels = [0, 0, 0, 0, 85, 150, 120, 0];
        regs.sensors = [128, 195, 108];
        regs.operating_state = [0x06, 0, 0, 0];
    }

    let outcomes = lap(&mut d);
    assert_eq!(outcomes[0], TickOutcome::KeepAlive(KeepAliveOutcome::Idle));
    for (outcome, query) in outcomes[1..].iter().zip(StatusQuery::ALL) {
        assert_eq!(
            *outcome,
            TickOutcome::Polled {
                query,
                updated: true
            }
        );
    }

    assert!(d.flags().heat_request);
    assert!(d.flags().combustion_fan);
    assert!(d.flags().glowplug);
    assert!(!d.flags().fuel_pump);
    assert_eq!(d.drive_levels().glowplug_percent, 85.0);
    assert!((d.drive_levels().fuel_pump_hz - 3.0).abs() < 1e-9);
    assert_eq!(d.drive_levels().combustion_fan_percent, 120.0);
    assert!((d.sensors().temperature_c - 45.2).abs() < 0.1);
    assert!((d.sensors().voltage_v - 13.4).abs() < 1e-9);
    assert!((d.sensors().glowplug_resistance_ohm - 1.1).abs() < 1e-9);
    assert_eq!(d.counters().working_hours, 12.5);
    assert_eq!(d.counters().operating_hours, 40.0);
    assert_eq!(d.counters().start_counter, 57);
    assert_eq!(d.operating_state().code, 0x06);
}

#[test]
fn test_failed_query_keeps_previous_snapshot() {
    let (mut d, clock) = driver();
    lap(&mut d);
    let before = *d.telemetry();

    d.transport_mut().registers_mut().sensors = [71, 180, 51];
    d.transport_mut().registers_mut().flags = 0x02;
    clock.advance(Duration::from_secs(5));

    // keep-alive not due, flags ok, drive levels ok, sensors corrupted
    assert_eq!(d.tick(), TickOutcome::Idle);
    assert!(matches!(d.tick(), TickOutcome::Polled { updated: true, .. }));
    assert!(matches!(d.tick(), TickOutcome::Polled { updated: true, .. }));
    d.transport_mut().faults_mut().corrupt_replies = 1;
    assert_eq!(
        d.tick(),
        TickOutcome::Polled {
            query: StatusQuery::Sensors,
            updated: false
        }
    );

    assert_eq!(d.sensors(), &before.sensors);
    assert!(d.flags().vent_request);
    assert_eq!(d.counters(), &before.counters);
}

#[test]
fn test_counters_polled_less_often() {
    let (mut d, clock) = driver();
    lap(&mut d);
    let sent = d.stats().frames_sent;
    clock.advance(Duration::from_secs(5));
    let outcomes = lap(&mut d);
    assert_eq!(outcomes[4], TickOutcome::Idle);
    // four 5 s queries ran
    assert_eq!(d.stats().frames_sent - sent, 4);
}

#[test]
fn test_keep_alive_renews_before_expiry() {
    let (mut d, clock) = driver();
    d.heat_on(Some(1)).expect("heat on");

    let mut renewals = 0;
    for lap_no in 0..4 {
        let outcomes = lap(&mut d);
        match outcomes[0] {
            TickOutcome::KeepAlive(KeepAliveOutcome::Renewed) => renewals += 1,
            TickOutcome::KeepAlive(KeepAliveOutcome::Confirmed) => {}
            other => panic!("lap {}: unexpected {:?}", lap_no, other),
        }
        clock.advance(Duration::from_secs(10));
    }

    // 60 -> 50 -> 40 -> 30 -> 20, renewed on the fourth round
    assert_eq!(renewals, 1);
    assert_eq!(d.session().remaining(), Duration::from_secs(60));
    assert_eq!(d.state(), HeaterState::Heating);
    let renew = d
        .transport()
        .requests()
        .iter()
        .filter(|r| r.as_slice() == [0x21, 0x01])
        .count();
    assert_eq!(renew, 2);
}

#[test]
fn test_keep_alive_failure_does_not_decrement() {
    let (mut d, _) = driver();
    d.vent_on(Some(2)).expect("vent on");
    d.transport_mut().faults_mut().drop_replies = 3;
    assert_eq!(
        d.tick(),
        TickOutcome::KeepAlive(KeepAliveOutcome::CheckFailed)
    );
    assert_eq!(d.session().remaining(), Duration::from_secs(120));
    assert_eq!(d.state(), HeaterState::Venting);
}

#[test]
fn test_noisy_bus_never_panics_and_counts_add_up() {
    let clock = ManualClock::new();
    let mut sim = SimulatedHeater::with_seed(7);
    sim.faults_mut().noise = 0.02;
    let mut d = HeaterDriver::new(sim, clock.clone(), &DriverConfig::default());
    let _ = d.heat_on(Some(30));

    for _ in 0..200 {
        d.tick();
        clock.advance(Duration::from_secs(1));
    }

    let s = d.stats();
    assert!(s.frames_sent > 0);
    assert_eq!(
        s.frames_sent,
        s.round_trips + s.echo_mismatches + s.reply_timeouts + s.malformed_frames
    );
}

#[test]
fn test_snapshot_serializes() {
    let (mut d, _) = driver();
    d.heat_on(None).expect("heat on");
    lap(&mut d);
    let json = serde_json::to_value(d.snapshot()).expect("json");
    assert_eq!(json["state"], "Heating");
    assert_eq!(json["telemetry"]["counters"]["start_counter"], 57);
}
