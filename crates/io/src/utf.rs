//! UTF-8 codec for 16-bit characters
//!
//! POF carries single characters as UTF-8 encoded UTF-16 code units, so a
//! character never needs more than three octets:
//!
//! | code unit                  | octets                       |
//! |----------------------------|------------------------------|
//! | 0x0001..=0x007F            | `0xxxxxxx`                   |
//! | 0x0000, 0x0080..=0x07FF    | `110xxxxx 10xxxxxx`          |
//! | 0x0800..=0xFFFF            | `1110xxxx 10xxxxxx 10xxxxxx` |
//!
//! NUL is written in its two-octet form so that encoded text never
//! contains a zero byte.

use gridwire_core::{Error, Result};

/// Encode one UTF-16 code unit, returning the number of octets written.
pub fn encode_char16(ch: u16, buf: &mut [u8; 3]) -> usize {
    if (0x0001..=0x007F).contains(&ch) {
        buf[0] = ch as u8;
        1
    } else if ch <= 0x07FF {
        buf[0] = 0xC0 | ((ch >> 6) & 0x1F) as u8;
        buf[1] = 0x80 | (ch & 0x3F) as u8;
        2
    } else {
        buf[0] = 0xE0 | ((ch >> 12) & 0x0F) as u8;
        buf[1] = 0x80 | ((ch >> 6) & 0x3F) as u8;
        buf[2] = 0x80 | (ch & 0x3F) as u8;
        3
    }
}

/// Outcome of decoding one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Code unit and octets consumed
    Char(u16, usize),
    /// The input ended inside a character
    Truncated,
}

/// Decode one UTF-16 code unit from the start of `bytes`.
///
/// `offset` is the stream position of `bytes[0]`, used for error context.
///
/// # Errors
///
/// Returns `UtfDataFormat` for an illegal leading octet or a continuation
/// octet that does not match `10xxxxxx`.
pub fn decode_char16(bytes: &[u8], offset: usize) -> Result<Decoded> {
    let b = match bytes.first() {
        Some(&b) => b,
        None => return Ok(Decoded::Truncated),
    };

    match (b & 0xF0) >> 4 {
        0x0..=0x7 => Ok(Decoded::Char(b as u16, 1)),
        0xC | 0xD => {
            let b2 = match bytes.get(1) {
                Some(&b2) => b2,
                None => return Ok(Decoded::Truncated),
            };
            check_continuation(b2, offset + 1)?;
            let ch = (((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16;
            Ok(Decoded::Char(ch, 2))
        }
        0xE => {
            if bytes.len() < 3 {
                return Ok(Decoded::Truncated);
            }
            let (b2, b3) = (bytes[1], bytes[2]);
            check_continuation(b2, offset + 1)?;
            check_continuation(b3, offset + 2)?;
            let ch = (((b & 0x0F) as u16) << 12)
                | (((b2 & 0x3F) as u16) << 6)
                | (b3 & 0x3F) as u16;
            Ok(Decoded::Char(ch, 3))
        }
        _ => Err(Error::utf(
            offset,
            format!("illegal leading UTF octet: 0x{:02X}", b),
        )),
    }
}

fn check_continuation(b: u8, offset: usize) -> Result<()> {
    if b & 0xC0 != 0x80 {
        return Err(Error::utf(
            offset,
            format!("illegal UTF continuation octet: 0x{:02X}", b),
        ));
    }
    Ok(())
}

/// Validate UTF-8 string content read from a stream.
pub fn decode_string(bytes: &[u8], offset: usize) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_owned()),
        Err(e) => Err(Error::utf(
            offset + e.valid_up_to(),
            format!("invalid UTF-8 in string of {} octets", bytes.len()),
        )),
    }
}
