//! LEB128-style unsigned varint codec with a 1/2/4-byte width cap (§4.A).
//!
//! Width is chosen purely from magnitude and is self-describing from the
//! leading bytes' continuation bits, exactly like standard LEB128 for the
//! 1- and 2-byte buckets. The 4-byte bucket spends its two structural
//! continuation bits (byte 0 and byte 1) on bucket selection and packs the
//! rest of the value across all four bytes, giving it 30 bits of payload —
//! `0..=0x3FFF_FFFF` (1,073,741,823). Every place PNGB uses a varint (ids,
//! counts, draw arguments, seeds) is comfortably inside that range; anything
//! that can legitimately grow past it (section byte offsets/lengths) is
//! carried as a fixed-width `u32` elsewhere in the format instead (§4.C),
//! so the cap never binds in practice.

use thiserror::Error;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;

/// Largest value the 4-byte bucket can hold without losing bits.
pub const MAX_VALUE: u32 = 0x3FFF_FFFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarintError {
    #[error("varint buffer truncated: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("varint value {0} exceeds the 4-byte bucket's 30-bit capacity ({MAX_VALUE})")]
    TooLarge(u32),
}

/// Appends the varint encoding of `value` to `out` and returns the number of
/// bytes written (1, 2, or 4).
///
/// # Panics
/// Panics if `value` exceeds [`MAX_VALUE`]; callers that accept untrusted
/// magnitudes should check against `MAX_VALUE` first (or use
/// [`try_encode`]).
pub fn encode(value: u32, out: &mut Vec<u8>) -> u8 {
    try_encode(value, out).unwrap_or_else(|e| panic!("{e}"))
}

/// Fallible form of [`encode`].
pub fn try_encode(value: u32, out: &mut Vec<u8>) -> Result<u8, VarintError> {
    if value <= 0x7f {
        out.push(value as u8);
        Ok(1)
    } else if value <= 0x3fff {
        out.push((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        out.push((value >> 7) as u8);
        Ok(2)
    } else if value <= MAX_VALUE {
        // Payload bit layout: byte0[0..7), byte1[7..14), byte2[14..22), byte3[22..30).
        out.push((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        out.push(((value >> 7) as u8 & PAYLOAD_MASK) | CONTINUATION);
        out.push((value >> 14) as u8);
        out.push((value >> 22) as u8);
        Ok(4)
    } else {
        Err(VarintError::TooLarge(value))
    }
}

/// The decoded value plus how many bytes of `buf` it consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub value: u32,
    pub len: u8,
}

/// Decodes a varint from the front of `buf`. Never reads past the slice;
/// rejects buffers that are shorter than the width the leading byte implies.
pub fn decode(buf: &[u8]) -> Result<Decoded, VarintError> {
    if buf.is_empty() {
        return Err(VarintError::Truncated {
            expected: 1,
            got: 0,
        });
    }
    let b0 = buf[0];
    if b0 & CONTINUATION == 0 {
        return Ok(Decoded {
            value: b0 as u32,
            len: 1,
        });
    }
    if buf.len() < 2 {
        return Err(VarintError::Truncated {
            expected: 2,
            got: buf.len(),
        });
    }
    let b1 = buf[1];
    if b1 & CONTINUATION == 0 {
        let value = (b0 & PAYLOAD_MASK) as u32 | ((b1 as u32) << 7);
        return Ok(Decoded { value, len: 2 });
    }
    if buf.len() < 4 {
        return Err(VarintError::Truncated {
            expected: 4,
            got: buf.len(),
        });
    }
    let b2 = buf[2];
    let b3 = buf[3];
    let value = (b0 & PAYLOAD_MASK) as u32
        | ((b1 & PAYLOAD_MASK) as u32) << 7
        | (b2 as u32) << 14
        | (b3 as u32) << 22;
    Ok(Decoded { value, len: 4 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(n: u32) -> Decoded {
        let mut buf = Vec::new();
        encode(n, &mut buf);
        decode(&buf).expect("decode of freshly encoded buffer must succeed")
    }

    #[test]
    fn encode_boundary_widths() {
        let mut buf = Vec::new();
        assert_eq!(encode(127, &mut buf), 1);
        buf.clear();
        assert_eq!(encode(128, &mut buf), 2);
        buf.clear();
        assert_eq!(encode(16383, &mut buf), 2);
        buf.clear();
        assert_eq!(encode(16384, &mut buf), 4);
        buf.clear();
        assert_eq!(encode(1_000_000, &mut buf), 4);
    }

    #[test]
    fn roundtrip_matches_input_across_buckets() {
        for n in [0u32, 1, 126, 127, 128, 200, 16383, 16384, 70000, 1_000_000, MAX_VALUE] {
            let decoded = roundtrip(n);
            assert_eq!(decoded.value, n, "roundtrip mismatch for {n}");
        }
    }

    #[test]
    fn try_encode_rejects_values_past_capacity() {
        let mut buf = Vec::new();
        assert_eq!(
            try_encode(MAX_VALUE + 1, &mut buf),
            Err(VarintError::TooLarge(MAX_VALUE + 1))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_rejects_truncated_buffers() {
        assert_eq!(
            decode(&[]),
            Err(VarintError::Truncated {
                expected: 1,
                got: 0
            })
        );
        assert_eq!(
            decode(&[0x80]),
            Err(VarintError::Truncated {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(
            decode(&[0x80, 0x80]),
            Err(VarintError::Truncated {
                expected: 4,
                got: 2
            })
        );
        assert_eq!(
            decode(&[0x80, 0x80, 0x80]),
            Err(VarintError::Truncated {
                expected: 4,
                got: 3
            })
        );
    }

    #[test]
    fn decode_never_reads_past_declared_width() {
        // A one-byte value embedded in a longer buffer: decode must report
        // len == 1 and not touch buf[1..].
        let buf = [0x05, 0xff, 0xff];
        let decoded = decode(&buf).unwrap();
        assert_eq!(decoded, Decoded { value: 5, len: 1 });
    }
}
