//! Frame encoding/validation
//!
//! Wire format:
//! - 1 byte: address (high nibble = sender id, low nibble = receiver id)
//! - 1 byte: length (payload length + 1, the checksum counts toward the body)
//! - N bytes: payload
//! - 1 byte: XOR of every preceding byte

use tracing::trace;

use super::{FrameError, CLIENT_ID, HOST_ID, MAX_PAYLOAD_SIZE};

/// Bytes a frame adds around its payload (address, length, checksum)
pub const FRAME_OVERHEAD: usize = 3;

/// Packed sender/receiver address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(u8);

impl Address {
    /// Pack a 4-bit sender and 4-bit receiver id
    pub const fn new(sender: u8, receiver: u8) -> Self {
        Self(((sender & 0x0f) << 4) | (receiver & 0x0f))
    }

    /// Frames we transmit: client to heater
    pub const fn outbound() -> Self {
        Self::new(CLIENT_ID, HOST_ID)
    }

    /// Frames the heater answers with: heater to client
    pub const fn inbound() -> Self {
        Self::new(HOST_ID, CLIENT_ID)
    }

    pub const fn sender(self) -> u8 {
        self.0 >> 4
    }

    pub const fn receiver(self) -> u8 {
        self.0 & 0x0f
    }

    /// Raw address byte as it appears on the wire
    pub const fn byte(self) -> u8 {
        self.0
    }
}

impl From<u8> for Address {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

/// XOR of all bytes
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// One addressed, length-prefixed, checksummed bus frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sender/receiver pair
    pub address: Address,
    /// Command or query code followed by its arguments / response data
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame; payloads longer than the length byte can express are truncated
    pub fn new(sender: u8, receiver: u8, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_PAYLOAD_SIZE);
        Self {
            address: Address::new(sender, receiver),
            payload: payload[..len].to_vec(),
        }
    }

    /// Frame addressed from us to the heater
    pub fn outbound(payload: &[u8]) -> Self {
        Self::new(CLIENT_ID, HOST_ID, payload)
    }

    /// Value carried in the length byte
    pub fn length_byte(&self) -> u8 {
        (self.payload.len() + 1) as u8
    }

    /// Encode the frame to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.push(self.address.byte());
        bytes.push(self.length_byte());
        bytes.extend_from_slice(&self.payload);
        bytes.push(xor_checksum(&bytes));
        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Validate a reply received from the heater.
    ///
    /// Checks, in order: total size against `expected_payload_len`, the
    /// heater-to-client address, the length byte and the checksum. All four
    /// are evaluated and traced; the first failing one is reported.
    pub fn validate(raw: &[u8], expected_payload_len: usize) -> Result<Self, FrameError> {
        let expected_size = expected_payload_len + FRAME_OVERHEAD;
        let expected_addr = Address::inbound().byte();

        let size_ok = raw.len() == expected_size;
        let addr = raw.first().copied().unwrap_or(0);
        let addr_ok = addr == expected_addr;
        let len_byte = raw.get(1).copied().unwrap_or(0);
        let expected_len_byte = raw.len().saturating_sub(2) as u8;
        let len_ok = raw.len() >= 2 && len_byte == expected_len_byte;
        let (received_chk, calculated_chk) = match raw.split_last() {
            Some((last, body)) => (*last, xor_checksum(body)),
            None => (0, 0),
        };
        let chk_ok = !raw.is_empty() && received_chk == calculated_chk;

        trace!(
            "validate: size {} (exp {}) {}, addr {:02x} (exp {:02x}) {}, len {:02x} (exp {:02x}) {}, chk {:02x} (calc {:02x}) {}",
            raw.len(),
            expected_size,
            ok_str(size_ok),
            addr,
            expected_addr,
            ok_str(addr_ok),
            len_byte,
            expected_len_byte,
            ok_str(len_ok),
            received_chk,
            calculated_chk,
            ok_str(chk_ok)
        );

        if !size_ok {
            return Err(FrameError::Length {
                expected: expected_size,
                actual: raw.len(),
            });
        }
        if !addr_ok {
            return Err(FrameError::Address {
                expected: expected_addr,
                actual: addr,
            });
        }
        if !len_ok {
            return Err(FrameError::LengthByte {
                expected: expected_len_byte,
                actual: len_byte,
            });
        }
        if !chk_ok {
            return Err(FrameError::Checksum {
                expected: calculated_chk,
                actual: received_chk,
            });
        }

        Ok(Self {
            address: Address::from(addr),
            payload: raw[2..raw.len() - 1].to_vec(),
        })
    }
}

fn ok_str(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Hex dump used in trace output
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Heater-side encoding of a reply, as it would appear on the wire
    fn reply_bytes(payload: &[u8]) -> Vec<u8> {
        Frame::new(HOST_ID, CLIENT_ID, payload).to_bytes()
    }

    #[test]
    fn test_address_packing() {
        let addr = Address::outbound();
        assert_eq!(addr.byte(), 0xf4);
        assert_eq!(addr.sender(), 0x0f);
        assert_eq!(addr.receiver(), 0x04);
        assert_eq!(Address::inbound().byte(), 0x4f);
    }

    #[test]
    fn test_encode_heat_on() {
        let bytes = Frame::outbound(&[0x21, 0x05]).to_bytes();
        // f4 ^ 03 ^ 21 ^ 05 = d3
        assert_eq!(bytes, vec![0xf4, 0x03, 0x21, 0x05, 0xd3]);
    }

    #[test]
    fn test_encode_off_has_length_two() {
        let bytes = Frame::outbound(&[0x10]).to_bytes();
        assert_eq!(bytes, vec![0xf4, 0x02, 0x10, 0xe6]);
    }

    #[test]
    fn test_validate_returns_payload() {
        let payload = [0xd0, 0x05, 0x80, 0xc3, 0x40];
        let frame = Frame::validate(&reply_bytes(&payload), payload.len())
            .expect("Should validate");
        assert_eq!(frame.payload, payload.to_vec());
        assert_eq!(frame.address, Address::inbound());
    }

    #[test]
    fn test_single_bit_flips_are_rejected() {
        let payload = [0xa1, 0x05];
        let good = reply_bytes(&payload);
        for byte in 0..good.len() {
            for bit in 0..8 {
                let mut bad = good.clone();
                bad[byte] ^= 1 << bit;
                assert!(
                    Frame::validate(&bad, payload.len()).is_err(),
                    "flip of byte {} bit {} went undetected",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_validate_wrong_size() {
        let raw = reply_bytes(&[0xa1, 0x05]);
        assert_eq!(
            Frame::validate(&raw[..4], 2),
            Err(FrameError::Length {
                expected: 5,
                actual: 4
            })
        );
        assert!(matches!(
            Frame::validate(&[], 2),
            Err(FrameError::Length { actual: 0, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_our_own_address() {
        // An outbound frame looped back must never pass as a reply
        let raw = Frame::outbound(&[0xa1, 0x05]).to_bytes();
        assert_eq!(
            Frame::validate(&raw, 2),
            Err(FrameError::Address {
                expected: 0x4f,
                actual: 0xf4
            })
        );
    }

    #[test]
    fn test_validate_reports_first_failure() {
        let mut raw = reply_bytes(&[0x90]);
        raw[1] = 0x07;
        // Length byte and checksum are both wrong now; length byte is checked first
        assert!(matches!(
            Frame::validate(&raw, 1),
            Err(FrameError::LengthByte {
                expected: 0x02,
                actual: 0x07
            })
        ));
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex(&[0xf4, 0x02, 0x10]), "F4 02 10");
        assert_eq!(hex(&[]), "");
    }
}
