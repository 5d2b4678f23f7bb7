//! Simulated heater - a [`Transport`] that behaves like a heater on the wire
//!
//! Echoes every written byte, answers well-formed frames the way a Webasto
//! heater does, and can inject the faults a real bus produces: collisions,
//! missing replies, refused commands, corrupted checksums and random bit noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::trace;

use crate::heater::HeaterState;
use crate::protocol::{
    ack_of, commands::STATUS_QUERY, xor_checksum, Address, Command, Frame, Transport, CLIENT_ID,
    HOST_ID, WAKE_BYTE,
};

/// Raw register contents returned by the status queries (bytes after the
/// `0xD0 <index>` prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaterRegisters {
    pub flags: u8,
    pub drive_levels: [u8; 8],
    pub sensors: [u8; 3],
    pub counters: [u8; 8],
    pub operating_state: [u8; 4],
}

impl Default for HeaterRegisters {
    fn default() -> Self {
        Self {
            flags: 0x00,
            drive_levels: [0; 8],
            // ~18 C, 13.4 V, no glowplug reading
            sensors: [186, 195, 0],
            // 12.5 h working, 40 h operating, 57 starts
            counters: [0, 12, 30, 0, 40, 0, 0, 57],
            operating_state: [0x04, 0, 0, 0],
        }
    }
}

/// Faults to inject; counters are consumed one frame at a time
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Corrupt our echo (as in a collision); the heater does not answer
    pub corrupt_echoes: u32,
    /// Swallow the request without answering
    pub drop_replies: u32,
    /// Answer without the acknowledge bit
    pub nack_replies: u32,
    /// Answer with a broken checksum
    pub corrupt_replies: u32,
    /// Exact reply payloads to send instead of the computed ones
    pub reply_overrides: VecDeque<Vec<u8>>,
    /// Probability that any reply byte gets one random bit flipped
    pub noise: f64,
    /// Line disconnected: nothing comes back, not even our echo
    pub disconnected: bool,
}

/// Heater model speaking W-Bus
pub struct SimulatedHeater {
    rx: VecDeque<u8>,
    pending: Vec<u8>,
    registers: HeaterRegisters,
    faults: Faults,
    rng: StdRng,
    state: HeaterState,
    minutes: u8,
    asleep: bool,
    requests: Vec<Vec<u8>>,
    wakes: usize,
}

impl Default for SimulatedHeater {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHeater {
    pub fn new() -> Self {
        Self::with_seed(0x5eed)
    }

    /// Deterministic noise source
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rx: VecDeque::new(),
            pending: Vec::new(),
            registers: HeaterRegisters::default(),
            faults: Faults::default(),
            rng: StdRng::seed_from_u64(seed),
            state: HeaterState::Off,
            minutes: 0,
            asleep: false,
            requests: Vec::new(),
            wakes: 0,
        }
    }

    pub fn registers_mut(&mut self) -> &mut HeaterRegisters {
        &mut self.registers
    }

    pub fn faults_mut(&mut self) -> &mut Faults {
        &mut self.faults
    }

    /// Mode the simulated heater is in
    pub fn state(&self) -> HeaterState {
        self.state
    }

    /// Minutes granted by the last accepted on-command
    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    /// Payloads of every well-formed request received, in order
    pub fn requests(&self) -> &[Vec<u8>] {
        &self.requests
    }

    pub fn wakes(&self) -> usize {
        self.wakes
    }

    /// Stop answering until the next wake pulse
    pub fn put_to_sleep(&mut self) {
        self.asleep = true;
    }

    /// Inject unsolicited bytes into the receive path
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    fn take(counter: &mut u32) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }

    /// Compute the reply payload for a request, updating heater state
    fn answer(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        let (&code, args) = request.split_first()?;
        let off = Command::Off.code();
        let heat = Command::HeatOn.code();
        let vent = Command::VentOn.code();
        let check = Command::Check.code();

        let reply = if code == off {
            self.state = HeaterState::Off;
            self.minutes = 0;
            vec![ack_of(code)]
        } else if code == heat || code == vent {
            let minutes = *args.first()?;
            self.state = if code == heat {
                HeaterState::Heating
            } else {
                HeaterState::Venting
            };
            self.minutes = minutes;
            vec![ack_of(code), minutes]
        } else if code == check {
            vec![ack_of(code), 0x00]
        } else if code == STATUS_QUERY {
            let index = *args.first()?;
            let mut reply = vec![ack_of(code), index];
            match index {
                0x03 => reply.push(self.registers.flags),
                0x04 => reply.extend_from_slice(&self.registers.drive_levels),
                0x05 => reply.extend_from_slice(&self.registers.sensors),
                0x06 => reply.extend_from_slice(&self.registers.counters),
                0x07 => reply.extend_from_slice(&self.registers.operating_state),
                _ => return None,
            }
            reply
        } else {
            return None;
        };
        Some(reply)
    }

    fn on_frame(&mut self, raw: &[u8]) {
        let (chk, body) = match raw.split_last() {
            Some(split) => split,
            None => return,
        };
        if body.len() < 2 || body[0] != Address::outbound().byte() || xor_checksum(body) != *chk {
            trace!("sim: ignoring malformed request");
            return;
        }
        if self.asleep {
            trace!("sim: asleep, ignoring request");
            return;
        }
        let request = body[2..].to_vec();
        self.requests.push(request.clone());

        if Self::take(&mut self.faults.drop_replies) {
            return;
        }
        let payload = match self.faults.reply_overrides.pop_front() {
            Some(payload) => payload,
            None => match self.answer(&request) {
                Some(mut payload) => {
                    if Self::take(&mut self.faults.nack_replies) {
                        payload[0] &= !0x80;
                    }
                    payload
                }
                None => return,
            },
        };

        let mut bytes = Frame::new(HOST_ID, CLIENT_ID, &payload).to_bytes();
        if Self::take(&mut self.faults.corrupt_replies) {
            if let Some(last) = bytes.last_mut() {
                *last ^= 0xff;
            }
        }
        if self.faults.noise > 0.0 {
            for byte in bytes.iter_mut() {
                if self.rng.gen_bool(self.faults.noise.min(1.0)) {
                    *byte ^= 1 << self.rng.gen_range(0..8);
                }
            }
        }
        self.rx.extend(bytes);
    }
}

impl Transport for SimulatedHeater {
    fn write(&mut self, bytes: &[u8]) {
        if self.faults.disconnected {
            return;
        }
        if Self::take(&mut self.faults.corrupt_echoes) {
            let mut echo = bytes.to_vec();
            if let Some(first) = echo.first_mut() {
                *first ^= 0x10;
            }
            self.rx.extend(echo);
            self.pending.clear();
            return;
        }
        self.rx.extend(bytes);

        for &b in bytes {
            self.pending.push(b);
            if self.pending.len() >= 2 {
                let total = self.pending[1] as usize + 2;
                if self.pending.len() == total {
                    let raw = std::mem::take(&mut self.pending);
                    self.on_frame(&raw);
                }
            }
        }
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn flush(&mut self) {}

    fn pulse_wake(&mut self) {
        self.wakes += 1;
        self.asleep = false;
        self.pending.clear();
        if !self.faults.disconnected {
            self.rx.push_back(WAKE_BYTE);
        }
    }
}
