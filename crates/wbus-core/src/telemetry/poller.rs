//! Table-driven status polling
//!
//! One descriptor per register block; polling is a single wake/transact/ack
//! round followed by the block's decoder. A failed poll leaves its snapshot
//! exactly as it was.

use tracing::{debug, warn};

use super::{Counters, DriveLevels, OperatingFlags, OperatingState, SensorReadings, Telemetry};
use crate::protocol::{ack_of, Bus, BusError, Clock, FrameError, StatusQuery, Transport};

/// How to query and decode one status block
#[derive(Clone, Copy)]
pub struct QueryDescriptor {
    pub query: StatusQuery,
    /// Reply payload length, including the echoed query code
    pub reply_len: usize,
    /// Decode the reply into its snapshot; `false` if the reply is too short
    pub apply: fn(&[u8], &mut Telemetry) -> bool,
}

/// All status blocks, in polling order
pub static QUERIES: [QueryDescriptor; 5] = [
    QueryDescriptor {
        query: StatusQuery::Flags,
        reply_len: OperatingFlags::REPLY_LEN,
        apply: apply_flags,
    },
    QueryDescriptor {
        query: StatusQuery::DriveLevels,
        reply_len: DriveLevels::REPLY_LEN,
        apply: apply_drive_levels,
    },
    QueryDescriptor {
        query: StatusQuery::Sensors,
        reply_len: SensorReadings::REPLY_LEN,
        apply: apply_sensors,
    },
    QueryDescriptor {
        query: StatusQuery::Counters,
        reply_len: Counters::REPLY_LEN,
        apply: apply_counters,
    },
    QueryDescriptor {
        query: StatusQuery::OperatingState,
        reply_len: OperatingState::REPLY_LEN,
        apply: apply_operating_state,
    },
];

impl QueryDescriptor {
    /// Look up the descriptor for a query
    pub fn of(query: StatusQuery) -> &'static QueryDescriptor {
        match query {
            StatusQuery::Flags => &QUERIES[0],
            StatusQuery::DriveLevels => &QUERIES[1],
            StatusQuery::Sensors => &QUERIES[2],
            StatusQuery::Counters => &QUERIES[3],
            StatusQuery::OperatingState => &QUERIES[4],
        }
    }
}

/// Run one status query and update its snapshot on success.
///
/// Single attempt: on failure the caller simply waits for the next period.
pub fn poll<T: Transport, C: Clock>(
    bus: &mut Bus<T, C>,
    desc: &QueryDescriptor,
    telemetry: &mut Telemetry,
) -> Result<(), BusError> {
    let payload = desc.query.payload();
    let expected = [ack_of(payload[0]), payload[1]];

    let reply = bus
        .request(&payload, desc.reply_len, &expected)
        .inspect_err(|e| warn!("{} query failed: {}", desc.query.name(), e))?;

    if !(desc.apply)(&reply, telemetry) {
        return Err(BusError::MalformedFrame(FrameError::Length {
            expected: desc.reply_len,
            actual: reply.len(),
        }));
    }
    Ok(())
}

fn apply_flags(reply: &[u8], t: &mut Telemetry) -> bool {
    let Some(flags) = OperatingFlags::decode(reply) else {
        return false;
    };
    debug!(
        "flags: heat_request={} vent_request={} combustion_fan={} glowplug={} fuel_pump={} nozzle_heating={}",
        flags.heat_request,
        flags.vent_request,
        flags.combustion_fan,
        flags.glowplug,
        flags.fuel_pump,
        flags.nozzle_heating
    );
    t.flags = flags;
    true
}

fn apply_drive_levels(reply: &[u8], t: &mut Telemetry) -> bool {
    let Some(levels) = DriveLevels::decode(reply) else {
        return false;
    };
    debug!(
        "drive levels: glowplug {:.0}%, fuel pump {:.2} Hz, combustion fan {:.0}%",
        levels.glowplug_percent, levels.fuel_pump_hz, levels.combustion_fan_percent
    );
    t.drive_levels = levels;
    true
}

fn apply_sensors(reply: &[u8], t: &mut Telemetry) -> bool {
    let Some(sensors) = SensorReadings::decode(reply) else {
        return false;
    };
    debug!(
        "sensors: {:+.1} C, {:.1} V, glowplug {:.3} Ohm",
        sensors.temperature_c, sensors.voltage_v, sensors.glowplug_resistance_ohm
    );
    t.sensors = sensors;
    true
}

fn apply_counters(reply: &[u8], t: &mut Telemetry) -> bool {
    let Some(counters) = Counters::decode(reply) else {
        return false;
    };
    debug!(
        "counters: working {:.2} h, operating {:.2} h, starts {}",
        counters.working_hours, counters.operating_hours, counters.start_counter
    );
    t.counters = counters;
    true
}

fn apply_operating_state(reply: &[u8], t: &mut Telemetry) -> bool {
    let Some(state) = OperatingState::decode(reply) else {
        return false;
    };
    debug!("operating state: {:02X}", state.code);
    t.operating_state = state;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup_matches_table() {
        for query in StatusQuery::ALL {
            assert_eq!(QueryDescriptor::of(query).query, query);
        }
    }

    #[test]
    fn test_apply_only_touches_own_snapshot() {
        let mut t = Telemetry::default();
        t.sensors.voltage_v = 12.5;
        assert!(apply_flags(&[0xd0, 0x03, 0x01], &mut t));
        assert!(t.flags.heat_request);
        assert_eq!(t.sensors.voltage_v, 12.5);
    }

    #[test]
    fn test_apply_rejects_short_reply() {
        let mut t = Telemetry::default();
        assert!(!apply_counters(&[0xd0, 0x06, 1], &mut t));
        assert_eq!(t, Telemetry::default());
    }
}
