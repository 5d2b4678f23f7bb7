//! Bus access: wake-up sequencing and echo-verified request/response
//!
//! Every byte we put on the single wire loops back to our receiver before the
//! heater answers, so a transaction is two bounded reads: first our own echo,
//! compared byte for byte, then the heater's reply frame.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::frame::hex;
use super::{BusError, Clock, Frame, Transport, FRAME_OVERHEAD};

/// Bounds for every wait the bus performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTiming {
    /// Silence after which a wake pulse precedes the next transaction
    pub wake_holdoff: Duration,
    /// How long to wait for the wake byte to come back
    pub wake_ack_timeout: Duration,
    /// Window for reading back our own transmission
    pub echo_timeout: Duration,
    /// Window for the heater's reply frame
    pub reply_timeout: Duration,
    /// Sleep between polls while waiting for bytes
    pub poll_interval: Duration,
}

impl Default for BusTiming {
    fn default() -> Self {
        Self {
            wake_holdoff: Duration::from_secs(30),
            wake_ack_timeout: Duration::from_millis(50),
            echo_timeout: Duration::from_millis(100),
            reply_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Cumulative traffic and failure counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub frames_sent: u64,
    pub round_trips: u64,
    pub wake_pulses: u64,
    pub echo_mismatches: u64,
    pub reply_timeouts: u64,
    pub malformed_frames: u64,
    pub not_acknowledged: u64,
    pub stray_bytes: u64,
}

/// Owner of the wire and of the liveness marker
pub struct Bus<T, C> {
    transport: T,
    clock: C,
    timing: BusTiming,
    /// Time of the last fully validated reply; `None` until the first one
    last_ok_rx: Option<Duration>,
    stats: BusStats,
}

impl<T: Transport, C: Clock> Bus<T, C> {
    /// Create a bus; the first transaction will always be preceded by a wake pulse
    pub fn new(transport: T, clock: C, timing: BusTiming) -> Self {
        Self {
            transport,
            clock,
            timing,
            last_ok_rx: None,
            stats: BusStats::default(),
        }
    }

    pub fn timing(&self) -> &BusTiming {
        &self.timing
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    /// Time of the last structurally valid reply
    pub fn last_ok_rx(&self) -> Option<Duration> {
        self.last_ok_rx
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current time on the bus clock
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether the hold-off window has elapsed since the last good reply
    pub fn needs_wake(&self) -> bool {
        match self.last_ok_rx {
            None => true,
            Some(last) => self.clock.now().saturating_sub(last) >= self.timing.wake_holdoff,
        }
    }

    /// Send a wake pulse if the bus has been quiet for too long.
    ///
    /// Returns `true` if a pulse was sent. Arrival of the looped-back wake
    /// byte and a plain timeout are both accepted as completion.
    pub fn ensure_awake(&mut self) -> bool {
        if !self.needs_wake() {
            if let Some(last) = self.last_ok_rx {
                trace!(
                    "wake not needed, last good rx {}ms ago",
                    self.clock.now().saturating_sub(last).as_millis()
                );
            }
            return false;
        }

        debug!("sending wake pulse");
        self.drain_stray();
        self.transport.pulse_wake();
        self.stats.wake_pulses += 1;

        let mut waste = [0u8; 1];
        let start = self.clock.now();
        while self.clock.now().saturating_sub(start) < self.timing.wake_ack_timeout {
            if self.transport.read_available(&mut waste) > 0 {
                trace!("wake byte returned: {:02X}", waste[0]);
                break;
            }
            self.clock.sleep(self.timing.poll_interval);
        }
        true
    }

    /// Discard whatever is sitting in the receive buffer
    pub fn drain_stray(&mut self) -> Vec<u8> {
        let stray = self.transport.drain_available();
        if !stray.is_empty() {
            self.stats.stray_bytes += stray.len() as u64;
        }
        stray
    }

    /// Read up to `count` bytes, giving up after `timeout`
    fn read_exact_timeout(&mut self, count: usize, timeout: Duration) -> Vec<u8> {
        let mut buf = vec![0u8; count];
        let mut offset = 0;
        let start = self.clock.now();

        while offset < count {
            let n = self.transport.read_available(&mut buf[offset..]);
            if n > 0 {
                offset += n;
                continue;
            }
            if self.clock.now().saturating_sub(start) >= timeout {
                trace!(
                    "read_exact_timeout: timed out after {} of {} bytes",
                    offset,
                    count
                );
                break;
            }
            self.clock.sleep(self.timing.poll_interval);
        }

        buf.truncate(offset);
        buf
    }

    /// Send one frame and return the heater's reply payload.
    ///
    /// `expected_reply_len` is the payload length of the reply (without
    /// address, length and checksum bytes).
    pub fn transact(
        &mut self,
        payload: &[u8],
        expected_reply_len: usize,
    ) -> Result<Vec<u8>, BusError> {
        let tx = Frame::outbound(payload).to_bytes();

        let stray = self.drain_stray();
        if !stray.is_empty() {
            debug!("discarded {} stray bytes: {}", stray.len(), hex(&stray));
        }

        trace!("TX: {}", hex(&tx));
        self.transport.write(&tx);
        self.transport.flush();
        self.stats.frames_sent += 1;

        let echo = self.read_exact_timeout(tx.len(), self.timing.echo_timeout);
        trace!("echo: {}", hex(&echo));
        if echo != tx {
            self.stats.echo_mismatches += 1;
            return Err(BusError::EchoMismatch {
                sent: tx,
                received: echo,
            });
        }

        let expected = expected_reply_len + FRAME_OVERHEAD;
        let start = self.clock.now();
        let rx = self.read_exact_timeout(expected, self.timing.reply_timeout);
        trace!(
            "RX {} bytes in {}ms: {}",
            rx.len(),
            self.clock.now().saturating_sub(start).as_millis(),
            hex(&rx)
        );
        if rx.len() < expected {
            self.stats.reply_timeouts += 1;
            return Err(BusError::ReplyTimeout {
                expected,
                received: rx.len(),
            });
        }

        let frame = Frame::validate(&rx, expected_reply_len).map_err(|e| {
            self.stats.malformed_frames += 1;
            BusError::from(e)
        })?;

        self.last_ok_rx = Some(self.clock.now());
        self.stats.round_trips += 1;
        Ok(frame.payload)
    }

    /// Wake the heater if needed, run one transaction and require the reply to
    /// start with `expected_prefix`
    pub fn request(
        &mut self,
        payload: &[u8],
        expected_reply_len: usize,
        expected_prefix: &[u8],
    ) -> Result<Vec<u8>, BusError> {
        self.ensure_awake();
        let reply = self.transact(payload, expected_reply_len)?;
        if !reply.starts_with(expected_prefix) {
            self.stats.not_acknowledged += 1;
            let actual = reply[..expected_prefix.len().min(reply.len())].to_vec();
            warn!(
                "reply {} does not confirm request {}",
                hex(&reply),
                hex(payload)
            );
            return Err(BusError::CommandNotAcknowledged {
                expected: expected_prefix.to_vec(),
                actual,
            });
        }
        Ok(reply)
    }
}
