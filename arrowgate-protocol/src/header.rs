//! Length header codec.
//!
//! Every frame begins with the byte length of its payload, written as an
//! unsigned 64-bit integer in network byte order (most significant byte
//! first):
//!
//! ```text
//! encode(1)   = [0, 0, 0, 0, 0, 0, 0, 1]
//! encode(256) = [0, 0, 0, 0, 0, 0, 1, 0]
//! ```
//!
//! Payloads longer than `u64::MAX` bytes cannot be described. That is a hard
//! limit of the format; lengths are never truncated to fit.

use crate::error::ProtocolError;

/// Size of the length header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Encodes a payload length.
pub fn encode(len: u64) -> [u8; HEADER_SIZE] {
    len.to_be_bytes()
}

/// Encodes the length of an in-memory payload.
pub fn encode_len(len: usize) -> Result<[u8; HEADER_SIZE], ProtocolError> {
    let len = u64::try_from(len).map_err(|_| ProtocolError::FrameTooLarge {
        size: u64::MAX,
        max: u64::MAX,
    })?;
    Ok(encode(len))
}

/// Encodes a signed length, rejecting negative values.
pub fn encode_signed(len: i64) -> Result<[u8; HEADER_SIZE], ProtocolError> {
    let len = u64::try_from(len).map_err(|_| ProtocolError::InvalidLength(len))?;
    Ok(encode(len))
}

/// Decodes a length header.
pub fn decode(header: [u8; HEADER_SIZE]) -> u64 {
    u64::from_be_bytes(header)
}

/// Decodes the length header at the start of `buf`.
pub fn decode_slice(buf: &[u8]) -> Result<u64, ProtocolError> {
    let header: [u8; HEADER_SIZE] = buf
        .get(..HEADER_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ProtocolError::IncompleteFrame {
            needed: HEADER_SIZE.saturating_sub(buf.len()),
        })?;
    Ok(decode(header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Place-value reference: byte i (ascending weight 256^i) is
    /// `(n / 256^i) mod 256`, then the sequence is reversed.
    fn place_value(n: u64) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        for (i, slot) in out.iter_mut().enumerate() {
            let weight = 256u128.pow(i as u32);
            *slot = ((n as u128 / weight) % 256) as u8;
        }
        out.reverse();
        out
    }

    #[test]
    fn test_encode_one() {
        assert_eq!(encode(1), [0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_encode_256() {
        assert_eq!(encode(256), [0, 0, 0, 0, 0, 0, 1, 0]);
    }

    #[test]
    fn test_encode_extremes() {
        assert_eq!(encode(0), [0; 8]);
        assert_eq!(encode(u64::MAX), [0xFF; 8]);
        assert_eq!(decode([0xFF; 8]), u64::MAX);
    }

    #[test]
    fn test_encode_signed_rejects_negative() {
        assert!(matches!(
            encode_signed(-1),
            Err(ProtocolError::InvalidLength(-1))
        ));
        assert_eq!(encode_signed(42).unwrap(), encode(42));
    }

    #[test]
    fn test_encode_len() {
        assert_eq!(encode_len(1024).unwrap(), [0, 0, 0, 0, 0, 0, 4, 0]);
    }

    #[test]
    fn test_decode_slice_short() {
        let result = decode_slice(&[0, 0, 1]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteFrame { needed: 5 })
        ));
    }

    #[test]
    fn test_decode_slice_ignores_trailing_bytes() {
        let mut buf = encode(7).to_vec();
        buf.extend_from_slice(b"payload");
        assert_eq!(decode_slice(&buf).unwrap(), 7);
    }

    #[test]
    fn test_decode_slice_exact_and_longer_buffers() {
        let header = encode(300);
        assert_eq!(decode_slice(&header).unwrap(), 300);

        let mut long = header.to_vec();
        long.extend_from_slice(&[0xAB; 64]);
        assert_eq!(decode_slice(&long).unwrap(), 300);
    }

    proptest! {
        #[test]
        fn prop_decode_slice_any_buffer(n in any::<u64>(), extra in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut buf = encode(n).to_vec();
            buf.extend_from_slice(&extra);
            prop_assert_eq!(decode_slice(&buf).unwrap(), n);
        }

        #[test]
        fn prop_roundtrip(n in any::<u64>()) {
            prop_assert_eq!(decode(encode(n)), n);
        }

        #[test]
        fn prop_matches_place_value(n in any::<u64>()) {
            prop_assert_eq!(encode(n), place_value(n));
        }
    }
}
