//! Byte transport over the shared wire
//!
//! The transport never reports errors upward: a failed write simply shows up
//! as an echo mismatch one layer up, and a failed read is "nothing available yet".

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::warn;

use super::{DEFAULT_BAUD_RATE, WAKE_BAUD_RATE, WAKE_BYTE};

/// Abstraction for the half-duplex single-wire link
pub trait Transport {
    /// Queue bytes for transmission
    fn write(&mut self, bytes: &[u8]);

    /// Non-blocking read of up to `buf.len()` already-received bytes
    fn read_available(&mut self, buf: &mut [u8]) -> usize;

    /// Block until queued output has physically left the UART
    fn flush(&mut self);

    /// Hold the line low long enough to reset the heater's listener, then
    /// restore the normal bit rate
    fn pulse_wake(&mut self);

    /// Read and return everything currently buffered
    fn drain_available(&mut self) -> Vec<u8> {
        let mut drained = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = self.read_available(&mut buf);
            if n == 0 {
                break;
            }
            drained.extend_from_slice(&buf[..n]);
        }
        drained
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) {
        (**self).write(bytes)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        (**self).read_available(buf)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn pulse_wake(&mut self) {
        (**self).pulse_wake()
    }
}

/// Serial port wrapper implementing [`Transport`]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    baud_rate: u32,
    wake_baud_rate: u32,
}

impl SerialTransport {
    /// Wrap an already opened and configured port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            baud_rate: DEFAULT_BAUD_RATE,
            wake_baud_rate: WAKE_BAUD_RATE,
        }
    }

    /// Override the normal and wake-pulse bit rates
    pub fn with_baud_rates(mut self, baud_rate: u32, wake_baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self.wake_baud_rate = wake_baud_rate;
        self
    }

    /// Time one start + 8 data + parity + stop character occupies the wire
    fn char_time(baud_rate: u32) -> Duration {
        let baud = baud_rate.max(1) as u64;
        Duration::from_micros(11 * 1_000_000 / baud)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) {
        if let Err(e) = self.port.write_all(bytes) {
            warn!("serial write failed: {}", e);
        }
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let available = match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                warn!("serial bytes_to_read failed: {}", e);
                return 0;
            }
        };
        if available == 0 || buf.is_empty() {
            return 0;
        }
        let to_read = available.min(buf.len());
        match self.port.read(&mut buf[..to_read]) {
            Ok(n) => n,
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                0
            }
            Err(e) => {
                warn!("serial read failed: {}", e);
                0
            }
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.port.flush() {
            warn!("serial flush failed: {}", e);
        }
    }

    fn pulse_wake(&mut self) {
        // 0x80 at a slow rate: start bit plus seven zero data bits keep the
        // line low for ~25ms at 300 baud
        self.flush();
        if let Err(e) = self.port.set_baud_rate(self.wake_baud_rate) {
            warn!("wake pulse: cannot switch to {} baud: {}", self.wake_baud_rate, e);
            return;
        }
        self.write(&[WAKE_BYTE]);
        self.flush();
        std::thread::sleep(Self::char_time(self.wake_baud_rate));
        if let Err(e) = self.port.set_baud_rate(self.baud_rate) {
            warn!("wake pulse: cannot restore {} baud: {}", self.baud_rate, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Chunked {
        rx: VecDeque<u8>,
        chunk: usize,
    }

    impl Transport for Chunked {
        fn write(&mut self, _bytes: &[u8]) {}

        fn read_available(&mut self, buf: &mut [u8]) -> usize {
            let n = self.chunk.min(buf.len()).min(self.rx.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.rx.pop_front().unwrap_or(0);
            }
            n
        }

        fn flush(&mut self) {}

        fn pulse_wake(&mut self) {}
    }

    #[test]
    fn test_drain_collects_all_chunks() {
        let mut t = Chunked {
            rx: (0u8..150).collect(),
            chunk: 7,
        };
        let drained = t.drain_available();
        assert_eq!(drained.len(), 150);
        assert_eq!(drained[149], 149);
        assert!(t.drain_available().is_empty());
    }

    #[test]
    fn test_boxed_transport_forwards() {
        let mut t: Box<dyn Transport> = Box::new(Chunked {
            rx: VecDeque::from(vec![1, 2, 3]),
            chunk: 2,
        });
        assert_eq!(t.drain_available(), vec![1, 2, 3]);
    }

    #[test]
    fn test_char_time() {
        assert_eq!(
            SerialTransport::char_time(300),
            Duration::from_micros(36_666)
        );
        assert_eq!(
            SerialTransport::char_time(2400),
            Duration::from_micros(4_583)
        );
    }
}
