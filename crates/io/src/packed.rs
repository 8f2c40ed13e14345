//! Variable-length integer codec
//!
//! ## Format
//!
//! ```text
//! first byte:  [c][s][d5 d4 d3 d2 d1 d0]
//! next bytes:  [c][d6 d5 d4 d3 d2 d1 d0] ...
//! ```
//!
//! - `c` (0x80): continuation, another byte follows
//! - `s` (0x40): sign, set for negative values
//! - the first byte carries the 6 lowest data bits, every following byte 7 more
//!
//! Negative values are stored as the bitwise complement of the value (not
//! its two's-complement negation); the decoder complements again after
//! reassembly when the sign bit is set. Values from -64 to 63 therefore fit
//! in a single byte.
//!
//! The 16/32/64-bit variants share one encoding; they differ only in the
//! width the decoder truncates to. Because sign extension preserves the
//! complemented magnitude, a value encodes to the same bytes at every width.

/// Longest possible encoding of a 64-bit value (6 + 9 * 7 >= 64 bits).
pub const MAX_PACKED_LEN: usize = 10;

/// Outcome of decoding a packed integer from a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unpacked {
    /// Decoded value and the number of bytes consumed
    Value(i64, usize),
    /// The slice ended before a terminating byte
    Truncated,
    /// More continuation bytes than any 64-bit value needs
    Overlong,
}

/// Encode `n` into `buf`, returning the number of bytes used.
///
/// # Example
///
/// ```ignore
/// let mut buf = [0u8; MAX_PACKED_LEN];
/// assert_eq!(encode_packed(-1, &mut buf), 1);
/// assert_eq!(buf[0], 0x40);
/// ```
pub fn encode_packed(n: i64, buf: &mut [u8; MAX_PACKED_LEN]) -> usize {
    let mut b: u8 = 0;
    let mut un = n as u64;
    if n < 0 {
        b = 0x40;
        un = !un;
    }

    b |= (un & 0x3F) as u8;
    un >>= 6;

    let mut len = 0;
    while un != 0 {
        buf[len] = b | 0x80;
        len += 1;
        b = (un & 0x7F) as u8;
        un >>= 7;
    }
    buf[len] = b;
    len + 1
}

/// Number of bytes `encode_packed` will use for `n`.
pub fn packed_len(n: i64) -> usize {
    let mut un = if n < 0 { !(n as u64) } else { n as u64 };
    un >>= 6;
    let mut len = 1;
    while un != 0 {
        len += 1;
        un >>= 7;
    }
    len
}

/// Decode a packed integer from the start of `bytes`.
pub fn decode_packed(bytes: &[u8]) -> Unpacked {
    let mut iter = bytes.iter();
    let mut b = match iter.next() {
        Some(&b) => b,
        None => return Unpacked::Truncated,
    };

    let mut n = (b & 0x3F) as u64;
    let negative = b & 0x40 != 0;
    let mut shift = 6u32;
    let mut used = 1usize;

    while b & 0x80 != 0 {
        if used == MAX_PACKED_LEN {
            return Unpacked::Overlong;
        }
        b = match iter.next() {
            Some(&b) => b,
            None => return Unpacked::Truncated,
        };
        used += 1;
        n |= ((b & 0x7F) as u64) << shift;
        shift += 7;
    }

    let value = if negative { !n } else { n } as i64;
    Unpacked::Value(value, used)
}
