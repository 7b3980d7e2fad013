//! Gateway frame encoder/decoder.
//!
//! Every command and every reply travels as one binary frame. This module
//! handles the pure byte-level encoding of request frames, validation of
//! reply frames, and extraction of the record payload from a reply.
//!
//! # Frame format
//!
//! ```text
//! 0xFF 0xFF <cmd> <size> [<payload>...] <checksum>
//! ```
//!
//! - Header: two `0xFF` bytes
//! - `cmd`: command byte (see [`Command`])
//! - `size`: payload length + 3 (command, size, and checksum bytes). Replies
//!   to a few commands use a two-byte big-endian size instead, see
//!   [`Command::response_size_width`].
//! - `checksum`: sum of every byte from `cmd` through the end of the
//!   payload, truncated to 8 bits

use bytes::{BufMut, BytesMut};
use gwlib_core::ProtocolError;

use crate::commands::Command;

/// Header byte repeated twice at the start of every frame.
pub const HEADER: u8 = 0xFF;

/// Largest request payload that fits the one-byte size field.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 3;

/// Shortest reply that can carry a command byte.
pub const MIN_RESPONSE_LEN: usize = 3;

/// Compute the frame checksum: the arithmetic sum of `bytes` modulo 256.
///
/// # Example
///
/// ```
/// use gwlib_ecowitt::frame::checksum;
///
/// assert_eq!(checksum(&[0x27, 0x03]), 0x2A);
/// assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
/// assert_eq!(checksum(&[]), 0x00);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Encode a request frame for `command` ready for transmission.
///
/// `None` and an empty payload produce the same frame.
///
/// # Example
///
/// ```
/// use gwlib_ecowitt::commands::Command;
/// use gwlib_ecowitt::frame::encode_frame;
///
/// let bytes = encode_frame(Command::LiveData, None).unwrap();
/// assert_eq!(bytes, vec![0xFF, 0xFF, 0x27, 0x03, 0x2A]);
/// ```
pub fn encode_frame(command: Command, payload: Option<&[u8]>) -> Result<Vec<u8>, ProtocolError> {
    encode_raw(command.code(), payload)
}

/// Encode a request frame for an arbitrary command byte.
pub fn encode_raw(cmd: u8, payload: Option<&[u8]>) -> Result<Vec<u8>, ProtocolError> {
    let payload = payload.unwrap_or(&[]);
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge { len: payload.len() });
    }

    let size = (payload.len() + 3) as u8;
    let mut buf = BytesMut::with_capacity(payload.len() + 5);
    buf.put_u8(HEADER);
    buf.put_u8(HEADER);
    buf.put_u8(cmd);
    buf.put_u8(size);
    buf.put_slice(payload);
    let sum = checksum(&buf[2..]);
    buf.put_u8(sum);
    Ok(buf.to_vec())
}

/// Encode a reply frame the way the gateway does.
///
/// Uses the size-field width the gateway uses for `command`. Mainly useful
/// for simulating a gateway in tests and tools.
pub fn encode_response(command: Command, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let width = command.response_size_width();
    let size = 1 + width + payload.len() + 1;
    let max = if width == 2 {
        u16::MAX as usize
    } else {
        u8::MAX as usize
    };
    if size > max {
        return Err(ProtocolError::PayloadTooLarge { len: payload.len() });
    }

    let mut buf = BytesMut::with_capacity(size + 2);
    buf.put_u8(HEADER);
    buf.put_u8(HEADER);
    buf.put_u8(command.code());
    if width == 2 {
        buf.put_u16(size as u16);
    } else {
        buf.put_u8(size as u8);
    }
    buf.put_slice(payload);
    let sum = checksum(&buf[2..]);
    buf.put_u8(sum);
    Ok(buf.to_vec())
}

/// Validate a reply frame against the command that was sent.
///
/// Checks, in order, stopping at the first failure:
///
/// 1. the reply is not empty ([`ProtocolError::NoResponse`]),
/// 2. it is at least 3 bytes long ([`ProtocolError::TooShort`]),
/// 3. byte 2 echoes `expected` ([`ProtocolError::CommandMismatch`]),
/// 4. the last byte is the checksum of bytes `2..len-1`
///    ([`ProtocolError::ChecksumMismatch`]).
///
/// On success the whole buffer is returned for the record codecs to slice.
///
/// # Example
///
/// ```
/// use gwlib_ecowitt::commands::Command;
/// use gwlib_ecowitt::frame::decode_and_validate;
///
/// let reply = [0xFF, 0xFF, 0x35, 0x04, 0x00, 0x39];
/// assert!(decode_and_validate(&reply, Command::WriteRainData).is_ok());
/// assert!(decode_and_validate(&reply, Command::WriteUserPath).is_err());
/// ```
pub fn decode_and_validate(buf: &[u8], expected: Command) -> Result<&[u8], ProtocolError> {
    validate_raw(buf, expected.code())
}

/// Validate a reply frame against an arbitrary command byte.
pub fn validate_raw(buf: &[u8], expected: u8) -> Result<&[u8], ProtocolError> {
    if buf.is_empty() {
        return Err(ProtocolError::NoResponse);
    }
    if buf.len() < MIN_RESPONSE_LEN {
        return Err(ProtocolError::TooShort { len: buf.len() });
    }
    if buf[2] != expected {
        return Err(ProtocolError::CommandMismatch {
            expected,
            actual: buf[2],
        });
    }

    let last = buf.len() - 1;
    let computed = checksum(&buf[2..last]);
    if buf[last] != computed {
        return Err(ProtocolError::ChecksumMismatch {
            expected: computed,
            actual: buf[last],
        });
    }

    Ok(buf)
}

/// The record payload of a validated reply to `command`.
///
/// Strips the header, command byte, size field, and trailing checksum.
pub fn body(response: &[u8], command: Command) -> Result<&[u8], ProtocolError> {
    let start = 3 + command.response_size_width();
    if response.len() < start + 1 {
        return Err(ProtocolError::Truncated {
            what: "frame header",
            needed: start + 1,
            available: response.len(),
        });
    }
    Ok(&response[start..response.len() - 1])
}

/// The result byte of a write acknowledgment. `0x00` means applied.
pub fn ack_status(response: &[u8], command: Command) -> Result<u8, ProtocolError> {
    body(response, command)?
        .first()
        .copied()
        .ok_or(ProtocolError::Truncated {
            what: "acknowledgment",
            needed: 1,
            available: 0,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ALL_COMMANDS;

    /// Deterministic payload generator covering a range of lengths and values.
    fn sample_payloads() -> Vec<Vec<u8>> {
        let mut payloads = vec![Vec::new(), vec![0x00], vec![0xFF; 7]];
        let mut seed: u32 = 0x1234_5678;
        for len in [1usize, 2, 3, 16, 64, 200, MAX_PAYLOAD_LEN] {
            let mut p = Vec::with_capacity(len);
            for _ in 0..len {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                p.push((seed >> 24) as u8);
            }
            payloads.push(p);
        }
        payloads
    }

    #[test]
    fn checksum_truncates_to_eight_bits() {
        assert_eq!(checksum(&[0x80, 0x80]), 0x00);
        assert_eq!(checksum(&[0xFF, 0xFF, 0x03]), 0x01);
        assert_eq!(checksum(&[1; 300]), (300 % 256) as u8);
    }

    #[test]
    fn encode_read_command_without_payload() {
        // 0x27 with no payload: size = 3, checksum = (39 + 3) mod 256 = 42.
        let frame = encode_raw(0x27, None).unwrap();
        assert_eq!(frame, vec![255, 255, 39, 3, 42]);
        assert_eq!(encode_frame(Command::LiveData, Some(&[])).unwrap(), frame);
    }

    #[test]
    fn encode_with_payload() {
        let frame = encode_frame(Command::SetSoilHumiAd, Some(&[0x00, 0x01, 0x00, 0x46, 0x01, 0x5E])).unwrap();
        assert_eq!(frame[..4], [0xFF, 0xFF, 0x29, 0x09]);
        assert_eq!(frame.len(), 11);
        assert_eq!(*frame.last().unwrap(), checksum(&frame[2..10]));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode_frame(Command::WriteCustomized, Some(&payload)),
            Err(ProtocolError::PayloadTooLarge {
                len: MAX_PAYLOAD_LEN + 1
            })
        );
    }

    #[test]
    fn encoded_frames_validate_for_every_payload() {
        for command in ALL_COMMANDS {
            for payload in sample_payloads() {
                let frame = encode_frame(command, Some(&payload)).unwrap();
                let validated = decode_and_validate(&frame, command).unwrap();
                assert_eq!(validated, frame.as_slice());

                let mut covered = vec![command.code(), (payload.len() + 3) as u8];
                covered.extend_from_slice(&payload);
                assert_eq!(*validated.last().unwrap(), checksum(&covered));
            }
        }
    }

    #[test]
    fn single_byte_corruption_is_detected() {
        let payload: Vec<u8> = (1..=20).collect();
        let frame = encode_frame(Command::WriteRainData, Some(&payload)).unwrap();

        // Size, payload, and checksum bytes are all covered by the checksum.
        for pos in 3..frame.len() {
            for delta in [1u8, 0x55, 0xFF] {
                let mut corrupted = frame.clone();
                corrupted[pos] = corrupted[pos].wrapping_add(delta);
                assert!(
                    matches!(
                        decode_and_validate(&corrupted, Command::WriteRainData),
                        Err(ProtocolError::ChecksumMismatch { .. })
                    ),
                    "corruption at {} by {:#04x} went unnoticed",
                    pos,
                    delta
                );
            }
        }
    }

    #[test]
    fn empty_reply_is_no_response() {
        assert_eq!(
            decode_and_validate(&[], Command::LiveData),
            Err(ProtocolError::NoResponse)
        );
    }

    #[test]
    fn short_reply_is_too_short() {
        assert_eq!(
            decode_and_validate(&[0xFF, 0xFF], Command::LiveData),
            Err(ProtocolError::TooShort { len: 2 })
        );
    }

    #[test]
    fn command_echo_is_checked_before_checksum() {
        // Valid frame for 0x3C, validated against 0x27.
        let frame = encode_frame(Command::ReadSensorIdNew, None).unwrap();
        assert_eq!(
            decode_and_validate(&frame, Command::LiveData),
            Err(ProtocolError::CommandMismatch {
                expected: 0x27,
                actual: 0x3C
            })
        );

        // Even with a broken checksum the mismatch wins.
        let mut broken = frame.clone();
        *broken.last_mut().unwrap() ^= 0xFF;
        assert!(matches!(
            decode_and_validate(&broken, Command::LiveData),
            Err(ProtocolError::CommandMismatch { .. })
        ));
    }

    #[test]
    fn checksum_mismatch_reports_both_values() {
        let reply = [0xFF, 0xFF, 0x35, 0x04, 0x00, 0x3A];
        assert_eq!(
            decode_and_validate(&reply, Command::WriteRainData),
            Err(ProtocolError::ChecksumMismatch {
                expected: 0x39,
                actual: 0x3A
            })
        );
    }

    #[test]
    fn response_with_wide_size_field() {
        let body_bytes = [0x01, 0x00, 0xEA, 0x06, 0x2F];
        let reply = encode_response(Command::LiveData, &body_bytes).unwrap();
        assert_eq!(reply[..5], [0xFF, 0xFF, 0x27, 0x00, 0x09]);
        decode_and_validate(&reply, Command::LiveData).unwrap();
        assert_eq!(body(&reply, Command::LiveData).unwrap(), &body_bytes);
    }

    #[test]
    fn response_with_narrow_size_field() {
        let reply = encode_response(Command::WriteRainData, &[0x00]).unwrap();
        assert_eq!(reply, vec![0xFF, 0xFF, 0x35, 0x04, 0x00, 0x39]);
        assert_eq!(body(&reply, Command::WriteRainData).unwrap(), &[0x00]);
    }

    #[test]
    fn ack_status_reads_result_byte() {
        let ok = encode_response(Command::WriteRainData, &[0x00]).unwrap();
        assert_eq!(ack_status(&ok, Command::WriteRainData), Ok(0));

        let rejected = encode_response(Command::SetSoilHumiAd, &[0x01]).unwrap();
        assert_eq!(ack_status(&rejected, Command::SetSoilHumiAd), Ok(1));

        let empty = encode_response(Command::WriteUserPath, &[]).unwrap();
        assert!(ack_status(&empty, Command::WriteUserPath).is_err());
    }

    #[test]
    fn body_of_truncated_reply() {
        let reply = [0xFF, 0xFF, 0x27, 0x00];
        assert!(matches!(
            body(&reply, Command::LiveData),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}
