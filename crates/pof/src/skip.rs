//! Skipping encoded values without decoding them.
//!
//! Used by readers to step over properties they were not asked for and to
//! discard the unread tail of a user type.

use crate::constants::*;
use crate::writer::MAX_NESTING;
use gridwire_core::{Error, Result};
use gridwire_io::BufferInput;

/// Skip `count` packed integers without decoding them.
pub fn skip_ints(input: &mut BufferInput, count: usize) -> Result<()> {
    for _ in 0..count {
        while input.read_u8()? & 0x80 != 0 {}
    }
    Ok(())
}

/// Read a complex-value size; negative sizes are rejected.
pub(crate) fn read_size(input: &mut BufferInput) -> Result<usize> {
    let offset = input.offset();
    let n = input.read_i32()?;
    if n < 0 {
        return Err(Error::format(offset, format!("negative size: {}", n)));
    }
    Ok(n as usize)
}

/// Read the shared type id of a uniform complex. Value ids carry no body,
/// so they cannot stand for every element.
pub(crate) fn read_uniform_type(input: &mut BufferInput) -> Result<i32> {
    let offset = input.offset();
    match input.read_i32()? {
        n @ V_INT_22..=V_BOOLEAN_FALSE => {
            Err(Error::format(offset, format!("value id {} used as a uniform type", n)))
        }
        n => Ok(n),
    }
}

/// Skip one value including its type id and optional identity prefix.
pub fn skip_value(input: &mut BufferInput) -> Result<()> {
    skip_value_at(input, 0)
}

/// Skip one value whose type id is already known.
///
/// # Errors
///
/// Returns `IllegalState` for a negative id that is not a POF type, `Eof`
/// if the value is truncated, and `Format` if complex values or user types
/// nest deeper than [`MAX_NESTING`].
pub fn skip_uniform_value(input: &mut BufferInput, type_id: i32) -> Result<()> {
    skip_uniform_at(input, type_id, 0)
}

/// Depth for the contents of a complex value or user type.
fn descend(input: &BufferInput, depth: usize) -> Result<usize> {
    if depth >= MAX_NESTING {
        return Err(Error::format(
            input.offset(),
            format!("values nested deeper than {}", MAX_NESTING),
        ));
    }
    Ok(depth + 1)
}

fn skip_value_at(input: &mut BufferInput, depth: usize) -> Result<()> {
    let mut type_id = input.read_i32()?;
    if type_id == T_IDENTITY {
        skip_ints(input, 1)?;
        type_id = input.read_i32()?;
    }
    skip_uniform_at(input, type_id, depth)
}

fn skip_uniform_at(input: &mut BufferInput, type_id: i32, depth: usize) -> Result<()> {
    match type_id {
        T_INT16 | T_INT32 | T_INT64 | T_INT128 | T_REFERENCE | T_BOOLEAN => skip_ints(input, 1),
        T_YEAR_MONTH_INTERVAL => skip_ints(input, 2),
        T_DATE => skip_ints(input, 3),
        T_TIME_INTERVAL => skip_ints(input, 4),
        T_DAY_TIME_INTERVAL => skip_ints(input, 5),
        T_FLOAT32 => input.skip(4),
        T_FLOAT64 => input.skip(8),
        T_FLOAT128 => input.skip(16),
        T_DECIMAL32 | T_DECIMAL64 | T_DECIMAL128 => skip_ints(input, 2),
        T_OCTET => input.skip(1),
        T_CHAR => input.read_char16().map(drop),
        T_OCTET_STRING | T_CHAR_STRING => {
            let offset = input.offset();
            match input.read_i32()? {
                V_REFERENCE_NULL => Ok(()),
                n if n < 0 => Err(Error::format(offset, format!("negative size: {}", n))),
                n => input.skip(n as usize),
            }
        }
        T_DATETIME => {
            skip_ints(input, 3)?;
            skip_time(input)
        }
        T_TIME => skip_time(input),
        T_COLLECTION | T_ARRAY => {
            let depth = descend(input, depth)?;
            for _ in 0..read_size(input)? {
                skip_value_at(input, depth)?;
            }
            Ok(())
        }
        T_UNIFORM_COLLECTION | T_UNIFORM_ARRAY => {
            let depth = descend(input, depth)?;
            let elem = read_uniform_type(input)?;
            for _ in 0..read_size(input)? {
                skip_uniform_at(input, elem, depth)?;
            }
            Ok(())
        }
        T_SPARSE_ARRAY => skip_sparse(input, None, descend(input, depth)?),
        T_UNIFORM_SPARSE_ARRAY => {
            let depth = descend(input, depth)?;
            let elem = read_uniform_type(input)?;
            skip_sparse(input, Some(elem), depth)
        }
        T_MAP => {
            let depth = descend(input, depth)?;
            for _ in 0..read_size(input)? {
                skip_value_at(input, depth)?;
                skip_value_at(input, depth)?;
            }
            Ok(())
        }
        T_UNIFORM_KEYS_MAP => {
            let depth = descend(input, depth)?;
            let keys = read_uniform_type(input)?;
            for _ in 0..read_size(input)? {
                skip_uniform_at(input, keys, depth)?;
                skip_value_at(input, depth)?;
            }
            Ok(())
        }
        T_UNIFORM_MAP => {
            let depth = descend(input, depth)?;
            let keys = read_uniform_type(input)?;
            let values = read_uniform_type(input)?;
            for _ in 0..read_size(input)? {
                skip_uniform_at(input, keys, depth)?;
                skip_uniform_at(input, values, depth)?;
            }
            Ok(())
        }
        V_INT_22..=V_BOOLEAN_FALSE => Ok(()),
        n if n >= 0 => {
            // version id, then properties up to the terminator
            let depth = descend(input, depth)?;
            skip_ints(input, 1)?;
            while input.read_i32()? >= 0 {
                skip_value_at(input, depth)?;
            }
            Ok(())
        }
        n => Err(Error::illegal_state(format!("type={}", n))),
    }
}

fn skip_time(input: &mut BufferInput) -> Result<()> {
    skip_ints(input, 4)?;
    if input.read_i32()? == 2 {
        skip_ints(input, 2)?;
    }
    Ok(())
}

/// Sparse arrays carry one entry per present index, then a -1 terminator.
fn skip_sparse(input: &mut BufferInput, elem: Option<i32>, depth: usize) -> Result<()> {
    let count = read_size(input)?;
    for _ in 0..=count {
        if input.read_i32()? < 0 {
            break;
        }
        match elem {
            Some(t) => skip_uniform_at(input, t, depth)?,
            None => skip_value_at(input, depth)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwire_core::{Binary, ErrorKind};
    use gridwire_io::BinaryWriteBuffer;

    fn encode(f: impl FnOnce(&mut gridwire_io::BufferOutput<'_>) -> Result<()>) -> BufferInput {
        let mut buf = BinaryWriteBuffer::new(64);
        {
            let mut out = buf.buffer_output();
            f(&mut out).unwrap();
            // sentinel so the tests can check where skipping stopped
            out.write_u8(0x7F).unwrap();
        }
        BufferInput::new(buf.into_binary())
    }

    fn assert_at_sentinel(input: &mut BufferInput) {
        assert_eq!(input.read_u8().unwrap(), 0x7F);
    }

    #[test]
    fn test_skip_ints() {
        let mut input = encode(|o| {
            o.write_i64(i64::MAX)?;
            o.write_i32(-1)?;
            o.write_i32(300)
        });
        skip_ints(&mut input, 3).unwrap();
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_skip_scalars() {
        let mut input = encode(|o| {
            o.write_i32(T_FLOAT64)?;
            o.write_f64(1.5)?;
            o.write_i32(T_CHAR)?;
            o.write_char16(0x20AC)?;
            o.write_i32(T_CHAR_STRING)?;
            o.write_string(Some("héllo"))?;
            o.write_i32(T_OCTET_STRING)?;
            o.write_i32(V_REFERENCE_NULL)?;
            o.write_i32(V_INT_0)
        });
        for _ in 0..5 {
            skip_value(&mut input).unwrap();
        }
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_skip_time_with_offset_zone() {
        let mut input = encode(|o| {
            o.write_i32(T_DATETIME)?;
            for n in [2024, 2, 29, 23, 59, 60, 0, 2, -5, 30] {
                o.write_i32(n)?;
            }
            Ok(())
        });
        skip_value(&mut input).unwrap();
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_skip_identity_prefix() {
        let mut input = encode(|o| {
            o.write_i32(T_IDENTITY)?;
            o.write_i32(3)?;
            o.write_i32(T_INT32)?;
            o.write_i32(99)
        });
        skip_value(&mut input).unwrap();
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_skip_sparse_consumes_terminator() {
        // dense sparse array: every index present, then the terminator
        let mut input = encode(|o| {
            o.write_i32(T_SPARSE_ARRAY)?;
            o.write_i32(2)?;
            o.write_i32(0)?;
            o.write_i32(V_INT_0 - 1)?;
            o.write_i32(1)?;
            o.write_i32(V_INT_0 - 2)?;
            o.write_i32(PROPERTY_END)
        });
        skip_value(&mut input).unwrap();
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_skip_uniform_map() {
        let mut input = encode(|o| {
            o.write_i32(T_UNIFORM_MAP)?;
            o.write_i32(T_CHAR_STRING)?;
            o.write_i32(T_INT32)?;
            o.write_i32(2)?;
            o.write_string(Some("a"))?;
            o.write_i32(1)?;
            o.write_string(Some("b"))?;
            o.write_i32(2)
        });
        skip_value(&mut input).unwrap();
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_skip_user_type() {
        let mut input = encode(|o| {
            o.write_i32(1001)?;
            o.write_i32(0)?;
            o.write_i32(0)?;
            o.write_i32(T_CHAR_STRING)?;
            o.write_string(Some("x"))?;
            o.write_i32(4)?;
            o.write_i32(V_BOOLEAN_TRUE)?;
            o.write_i32(PROPERTY_END)
        });
        skip_value(&mut input).unwrap();
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_unknown_type_is_illegal_state() {
        let mut input = BufferInput::new(Binary::from(vec![]));
        let err = skip_uniform_value(&mut input, T_UNKNOWN).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
    }

    fn nested_arrays(levels: usize) -> BufferInput {
        encode(|o| {
            for _ in 0..levels {
                o.write_i32(T_ARRAY)?;
                o.write_i32(1)?;
            }
            o.write_i32(V_INT_0)
        })
    }

    #[test]
    fn test_skip_nesting_at_limit() {
        let mut input = nested_arrays(MAX_NESTING);
        skip_value(&mut input).unwrap();
        assert_at_sentinel(&mut input);
    }

    #[test]
    fn test_skip_nesting_past_limit() {
        let mut input = nested_arrays(MAX_NESTING + 1);
        let err = skip_value(&mut input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let mut input = nested_arrays(200_000);
        assert_eq!(skip_value(&mut input).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_skip_nested_user_types_past_limit() {
        let mut input = encode(|o| {
            for _ in 0..=MAX_NESTING {
                o.write_i32(1001)?;
                o.write_i32(0)?;
                o.write_i32(0)?;
            }
            Ok(())
        });
        assert_eq!(skip_value(&mut input).unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_skip_char_rejects_bad_lead() {
        for lead in [0x80u8, 0xBF, 0xF0] {
            let mut input = BufferInput::new(Binary::from(vec![lead, 0x80, 0x80]));
            let err = skip_uniform_value(&mut input, T_CHAR).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UtfDataFormat);
        }
    }

    #[test]
    fn test_uniform_value_id_rejected() {
        for header in [
            vec![T_UNIFORM_ARRAY, V_INT_0, i32::MAX],
            vec![T_UNIFORM_MAP, V_BOOLEAN_TRUE, V_INT_22, i32::MAX],
        ] {
            let mut input = encode(|o| header.iter().try_for_each(|&n| o.write_i32(n)));
            let err = skip_value(&mut input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format);
        }
    }

    #[test]
    fn test_truncated_is_eof() {
        let mut input = BufferInput::new(Binary::from(vec![0x40 | (!T_FLOAT64 as u8), 0, 0]));
        assert!(skip_value(&mut input).unwrap_err().is_eof());
    }
}
