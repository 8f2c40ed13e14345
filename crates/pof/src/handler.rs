//! Low-level POF event encoder.
//!
//! [`WritingPofHandler`] turns a stream of value events into POF bytes. It
//! tracks the stack of open complex values (collections, maps, user types)
//! and decides, per event:
//!
//! - whether the position must be written (sparse complexes only)
//! - whether the type id must be written (non-uniform complexes only)
//! - whether a default value may be skipped or a compact value id used
//!
//! An identity registered for the next value, even the "no identity" id -1,
//! disables both skipping and compression for that one value.

use crate::constants::*;
use crate::raw::{RawDate, RawDateTime, RawDayTimeInterval, RawTime, RawTimeInterval, RawYearMonthInterval};
use gridwire_core::{Binary, Error, Result};
use gridwire_io::BufferOutput;

#[derive(Debug, Clone, Copy)]
struct MapComplex {
    value_uniform: Option<i32>,
    at_key: bool,
}

/// One open complex value.
#[derive(Debug, Clone, Copy)]
struct Complex {
    sparse: bool,
    uniform: Option<i32>,
    map: Option<MapComplex>,
}

impl Complex {
    fn plain(sparse: bool) -> Self {
        Complex {
            sparse,
            uniform: None,
            map: None,
        }
    }

    fn uniform(sparse: bool, type_id: i32) -> Self {
        Complex {
            sparse,
            uniform: Some(type_id),
            map: None,
        }
    }

    fn map(keys: Option<i32>, values: Option<i32>) -> Self {
        Complex {
            sparse: false,
            uniform: keys,
            map: Some(MapComplex {
                value_uniform: values,
                at_key: false,
            }),
        }
    }

    /// Map complexes alternate between key and value on every value.
    fn on_value(&mut self) {
        if let Some(m) = &mut self.map {
            m.at_key = !m.at_key;
        }
    }

    fn uniform_type(&self) -> Option<i32> {
        match self.map {
            Some(m) if !m.at_key => m.value_uniform,
            _ => self.uniform,
        }
    }
}

/// Encodes POF value events into a [`BufferOutput`].
#[derive(Debug)]
pub(crate) struct WritingPofHandler<'a> {
    out: BufferOutput<'a>,
    complexes: Vec<Complex>,
    has_identity: bool,
}

impl<'a> WritingPofHandler<'a> {
    pub(crate) fn new(out: BufferOutput<'a>) -> Self {
        WritingPofHandler {
            out,
            complexes: Vec::new(),
            has_identity: false,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.out.offset()
    }

    pub(crate) fn in_complex(&self) -> bool {
        !self.complexes.is_empty()
    }

    fn is_skippable(&self) -> bool {
        !self.has_identity && self.complexes.last().map_or(false, |c| c.sparse)
    }

    fn is_compressable(&self) -> bool {
        !self.has_identity
    }

    fn encode_position(&mut self, pos: i32) -> Result<()> {
        if let Some(complex) = self.complexes.last_mut() {
            complex.on_value();
            if pos >= 0 && complex.sparse {
                self.out.write_i32(pos)?;
            }
        }
        self.has_identity = false;
        Ok(())
    }

    /// True if the type id has to precede the value. Inside a uniform
    /// complex the value type must match the uniform type.
    fn is_type_id_encoded(&self, type_id: i32) -> Result<bool> {
        match self.complexes.last().and_then(|c| c.uniform_type()) {
            None => Ok(true),
            Some(u) if u == type_id || type_id == T_REFERENCE => Ok(false),
            Some(u) => Err(Error::illegal_argument(format!(
                "value of type {} written into a uniform complex of type {}",
                type_id, u
            ))),
        }
    }

    fn write_size(&mut self, len: usize) -> Result<()> {
        let n = i32::try_from(len)
            .map_err(|_| Error::illegal_argument(format!("size {} exceeds the POF limit", len)))?;
        self.out.write_i32(n)
    }

    // ========================================================================
    // Identities and references
    // ========================================================================

    /// Announce the identity of the next value; -1 announces "none" but
    /// still prevents the value from being skipped or compressed.
    pub(crate) fn register_identity(&mut self, id: i32) -> Result<()> {
        debug_assert!(!self.has_identity || id < 0);
        if id >= 0 {
            self.out.write_i32(T_IDENTITY)?;
            self.out.write_i32(id)?;
        }
        self.has_identity = true;
        Ok(())
    }

    pub(crate) fn on_null_reference(&mut self, pos: i32) -> Result<()> {
        if !self.is_skippable() {
            self.encode_position(pos)?;
            self.out.write_i32(V_REFERENCE_NULL)?;
        }
        Ok(())
    }

    pub(crate) fn on_identity_reference(&mut self, pos: i32, id: i32) -> Result<()> {
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_REFERENCE)? {
            self.out.write_i32(T_REFERENCE)?;
        }
        self.out.write_i32(id)
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Integer of any width; the packed form does not depend on the width.
    pub(crate) fn on_integer(&mut self, pos: i32, n: i64, type_id: i32) -> Result<()> {
        if n == 0 && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(type_id)? {
            if compressable && is_tiny_int(n) {
                return self.out.write_i32(encode_tiny_int(n as i32));
            }
            self.out.write_i32(type_id)?;
        }
        self.out.write_i64(n)
    }

    pub(crate) fn on_f32(&mut self, pos: i32, v: f32) -> Result<()> {
        let bits = v.to_bits();
        if bits == 0 && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_FLOAT32)? {
            if compressable && bits & 0xFFFF == 0 {
                let n = v as i32;
                let id = match bits {
                    0xFF80_0000 => Some(V_FP_NEG_INFINITY),
                    0x7F80_0000 => Some(V_FP_POS_INFINITY),
                    0x7FC0_0000 => Some(V_FP_NAN),
                    _ if is_tiny_int(n as i64) && (n as f32).to_bits() == bits => {
                        Some(encode_tiny_int(n))
                    }
                    _ => None,
                };
                if let Some(id) = id {
                    return self.out.write_i32(id);
                }
            }
            self.out.write_i32(T_FLOAT32)?;
        }
        self.out.write_f32(v)
    }

    pub(crate) fn on_f64(&mut self, pos: i32, v: f64) -> Result<()> {
        let bits = v.to_bits();
        if bits == 0 && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_FLOAT64)? {
            if compressable && bits & 0x0000_FFFF_FFFF_FFFF == 0 {
                let n = v as i32;
                let id = match bits {
                    0xFFF0_0000_0000_0000 => Some(V_FP_NEG_INFINITY),
                    0x7FF0_0000_0000_0000 => Some(V_FP_POS_INFINITY),
                    0x7FF8_0000_0000_0000 => Some(V_FP_NAN),
                    _ if is_tiny_int(n as i64) && (n as f64).to_bits() == bits => {
                        Some(encode_tiny_int(n))
                    }
                    _ => None,
                };
                if let Some(id) = id {
                    return self.out.write_i32(id);
                }
            }
            self.out.write_i32(T_FLOAT64)?;
        }
        self.out.write_f64(v)
    }

    pub(crate) fn on_bool(&mut self, pos: i32, f: bool) -> Result<()> {
        if !f && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_BOOLEAN)? {
            if compressable {
                return self
                    .out
                    .write_i32(if f { V_BOOLEAN_TRUE } else { V_BOOLEAN_FALSE });
            }
            self.out.write_i32(T_BOOLEAN)?;
        }
        self.out.write_i32(f as i32)
    }

    pub(crate) fn on_octet(&mut self, pos: i32, b: u8) -> Result<()> {
        if b == 0 && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_OCTET)? {
            if compressable {
                if b <= 22 {
                    return self.out.write_i32(encode_tiny_int(b as i32));
                } else if b == 0xFF {
                    return self.out.write_i32(V_INT_NEG_1);
                }
            }
            self.out.write_i32(T_OCTET)?;
        }
        self.out.write_u8(b)
    }

    pub(crate) fn on_char(&mut self, pos: i32, ch: u16) -> Result<()> {
        if ch == 0 && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_CHAR)? {
            if compressable {
                if ch <= 22 {
                    return self.out.write_i32(encode_tiny_int(ch as i32));
                } else if ch == 0xFFFF {
                    return self.out.write_i32(V_INT_NEG_1);
                }
            }
            self.out.write_i32(T_CHAR)?;
        }
        self.out.write_char16(ch)
    }

    pub(crate) fn on_octet_string(&mut self, pos: i32, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_OCTET_STRING)? {
            if bytes.is_empty() && compressable {
                return self.out.write_i32(V_STRING_ZERO_LENGTH);
            }
            self.out.write_i32(T_OCTET_STRING)?;
        }
        self.write_size(bytes.len())?;
        self.out.write_bytes(bytes)
    }

    pub(crate) fn on_char_string(&mut self, pos: i32, s: &str) -> Result<()> {
        if s.is_empty() && self.is_skippable() {
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(T_CHAR_STRING)? {
            if s.is_empty() && compressable {
                return self.out.write_i32(V_STRING_ZERO_LENGTH);
            }
            self.out.write_i32(T_CHAR_STRING)?;
        }
        self.out.write_string(Some(s))
    }

    // ========================================================================
    // Date and time
    // ========================================================================

    fn begin_fixed(&mut self, pos: i32, type_id: i32) -> Result<()> {
        self.encode_position(pos)?;
        if self.is_type_id_encoded(type_id)? {
            self.out.write_i32(type_id)?;
        }
        Ok(())
    }

    pub(crate) fn on_date(&mut self, pos: i32, v: &RawDate) -> Result<()> {
        self.begin_fixed(pos, T_DATE)?;
        v.write_to(&mut self.out)
    }

    pub(crate) fn on_year_month_interval(
        &mut self,
        pos: i32,
        v: &RawYearMonthInterval,
    ) -> Result<()> {
        self.begin_fixed(pos, T_YEAR_MONTH_INTERVAL)?;
        v.write_to(&mut self.out)
    }

    pub(crate) fn on_time(&mut self, pos: i32, v: &RawTime) -> Result<()> {
        self.begin_fixed(pos, T_TIME)?;
        v.write_to(&mut self.out)
    }

    pub(crate) fn on_time_interval(&mut self, pos: i32, v: &RawTimeInterval) -> Result<()> {
        self.begin_fixed(pos, T_TIME_INTERVAL)?;
        v.write_to(&mut self.out)
    }

    pub(crate) fn on_date_time(&mut self, pos: i32, v: &RawDateTime) -> Result<()> {
        self.begin_fixed(pos, T_DATETIME)?;
        v.write_to(&mut self.out)
    }

    pub(crate) fn on_day_time_interval(
        &mut self,
        pos: i32,
        v: &RawDayTimeInterval,
    ) -> Result<()> {
        self.begin_fixed(pos, T_DAY_TIME_INTERVAL)?;
        v.write_to(&mut self.out)
    }

    // ========================================================================
    // Complex values
    // ========================================================================

    /// Shared framing for every collection-like complex.
    ///
    /// `header` holds the uniform type ids written between the type id and
    /// the element count.
    fn begin_complex(
        &mut self,
        pos: i32,
        count: usize,
        type_id: i32,
        header: &[i32],
        complex: Complex,
    ) -> Result<()> {
        if count == 0 && self.is_skippable() {
            // dummy complex: no content, no terminator
            self.complexes.push(Complex::plain(false));
            return Ok(());
        }
        let compressable = self.is_compressable();
        self.encode_position(pos)?;
        if self.is_type_id_encoded(type_id)? {
            if count == 0 && compressable {
                self.out.write_i32(V_COLLECTION_EMPTY)?;
                self.complexes.push(Complex {
                    sparse: false,
                    ..complex
                });
                return Ok(());
            }
            self.out.write_i32(type_id)?;
        }
        for &id in header {
            self.out.write_i32(id)?;
        }
        self.write_size(count)?;
        self.complexes.push(complex);
        Ok(())
    }

    pub(crate) fn begin_collection(&mut self, pos: i32, count: usize) -> Result<()> {
        self.begin_complex(pos, count, T_COLLECTION, &[], Complex::plain(false))
    }

    pub(crate) fn begin_uniform_collection(
        &mut self,
        pos: i32,
        count: usize,
        type_id: i32,
    ) -> Result<()> {
        self.begin_complex(
            pos,
            count,
            T_UNIFORM_COLLECTION,
            &[type_id],
            Complex::uniform(false, type_id),
        )
    }

    pub(crate) fn begin_array(&mut self, pos: i32, count: usize) -> Result<()> {
        self.begin_complex(pos, count, T_ARRAY, &[], Complex::plain(false))
    }

    pub(crate) fn begin_uniform_array(&mut self, pos: i32, count: usize, type_id: i32) -> Result<()> {
        self.begin_complex(
            pos,
            count,
            T_UNIFORM_ARRAY,
            &[type_id],
            Complex::uniform(false, type_id),
        )
    }

    pub(crate) fn begin_sparse_array(&mut self, pos: i32, count: usize) -> Result<()> {
        self.begin_complex(pos, count, T_SPARSE_ARRAY, &[], Complex::plain(true))
    }

    pub(crate) fn begin_uniform_sparse_array(
        &mut self,
        pos: i32,
        count: usize,
        type_id: i32,
    ) -> Result<()> {
        self.begin_complex(
            pos,
            count,
            T_UNIFORM_SPARSE_ARRAY,
            &[type_id],
            Complex::uniform(true, type_id),
        )
    }

    pub(crate) fn begin_map(&mut self, pos: i32, count: usize) -> Result<()> {
        self.begin_complex(pos, count, T_MAP, &[], Complex::map(None, None))
    }

    pub(crate) fn begin_uniform_keys_map(&mut self, pos: i32, count: usize, keys: i32) -> Result<()> {
        self.begin_complex(
            pos,
            count,
            T_UNIFORM_KEYS_MAP,
            &[keys],
            Complex::map(Some(keys), None),
        )
    }

    pub(crate) fn begin_uniform_map(
        &mut self,
        pos: i32,
        count: usize,
        keys: i32,
        values: i32,
    ) -> Result<()> {
        self.begin_complex(
            pos,
            count,
            T_UNIFORM_MAP,
            &[keys, values],
            Complex::map(Some(keys), Some(values)),
        )
    }

    /// Write a user-type header: `[t_identity id] [type id] version`.
    pub(crate) fn begin_user_type(
        &mut self,
        pos: i32,
        id: i32,
        type_id: i32,
        version_id: i32,
    ) -> Result<()> {
        self.encode_position(pos)?;
        self.register_identity(id)?;
        if self.is_type_id_encoded(type_id)? {
            self.out.write_i32(type_id)?;
        }
        self.out.write_i32(version_id)?;
        self.complexes.push(Complex::plain(true));
        Ok(())
    }

    /// Close the innermost complex, terminating it if it is sparse.
    pub(crate) fn end_complex(&mut self) -> Result<()> {
        let complex = self
            .complexes
            .pop()
            .ok_or_else(|| Error::illegal_state("no complex value is open"))?;
        if complex.sparse {
            self.out.write_i32(PROPERTY_END)?;
        }
        Ok(())
    }

    /// Copy pre-encoded property bytes verbatim.
    pub(crate) fn write_raw(&mut self, bin: &Binary) -> Result<()> {
        self.out.write_buffer(bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwire_io::BinaryWriteBuffer;

    fn encode(f: impl FnOnce(&mut WritingPofHandler<'_>) -> Result<()>) -> Vec<u8> {
        let mut buf = BinaryWriteBuffer::new(64);
        {
            let mut h = WritingPofHandler::new(buf.buffer_output());
            f(&mut h).unwrap();
        }
        buf.as_slice().to_vec()
    }

    /// Packed encoding of a small negative id: 0x40 | !n.
    fn id(n: i32) -> u8 {
        assert!((-64..0).contains(&n));
        0x40 | (!n as u8)
    }

    #[test]
    fn test_tiny_ints_at_top_level() {
        assert_eq!(encode(|h| h.on_integer(0, 5, T_INT32)), vec![id(V_INT_0 - 5)]);
        assert_eq!(encode(|h| h.on_integer(0, -1, T_INT64)), vec![id(V_INT_NEG_1)]);
        assert_eq!(encode(|h| h.on_integer(0, 23, T_INT32)), vec![id(T_INT32), 23]);
    }

    #[test]
    fn test_identity_disables_compression() {
        let bytes = encode(|h| {
            h.register_identity(-1)?;
            h.on_integer(0, 5, T_INT32)
        });
        assert_eq!(bytes, vec![id(T_INT32), 5]);
    }

    #[test]
    fn test_float_compression() {
        assert_eq!(encode(|h| h.on_f64(0, 3.0)), vec![id(V_INT_0 - 3)]);
        assert_eq!(encode(|h| h.on_f32(0, f32::NAN)), vec![id(V_FP_NAN)]);
        assert_eq!(encode(|h| h.on_f64(0, f64::NEG_INFINITY)), vec![id(V_FP_NEG_INFINITY)]);
        // negative zero keeps its sign
        let bytes = encode(|h| h.on_f32(0, -0.0));
        assert_eq!(bytes[0], id(T_FLOAT32));
        assert_eq!(bytes.len(), 5);
        // 0.5 is not integral
        assert_eq!(encode(|h| h.on_f64(0, 0.5)).len(), 9);
    }

    #[test]
    fn test_octet_and_char_compression() {
        assert_eq!(encode(|h| h.on_octet(0, 0xFF)), vec![id(V_INT_NEG_1)]);
        assert_eq!(encode(|h| h.on_octet(0, 200)), vec![id(T_OCTET), 200]);
        assert_eq!(encode(|h| h.on_char(0, 'A' as u16)), vec![id(T_CHAR), b'A']);
        assert_eq!(encode(|h| h.on_bool(0, true)), vec![id(V_BOOLEAN_TRUE)]);
    }

    #[test]
    fn test_sparse_complex_skips_defaults() {
        let bytes = encode(|h| {
            h.begin_user_type(0, -1, 7, 0)?;
            h.on_integer(1, 0, T_INT32)?;
            h.on_bool(2, false)?;
            h.on_char_string(3, "")?;
            h.on_null_reference(4)?;
            h.on_integer(5, 1, T_INT32)?;
            h.end_complex()
        });
        // the header leaves the identity flag set, so property 1 is written
        // in full; properties 2-4 are skipped
        assert_eq!(
            bytes,
            vec![7, 0, 1, id(T_INT32), 0, 5, id(V_INT_0 - 1), id(PROPERTY_END)]
        );
    }

    #[test]
    fn test_uniform_array_omits_type_ids() {
        let bytes = encode(|h| {
            h.begin_uniform_array(0, 2, T_INT32)?;
            h.on_integer(0, 1, T_INT32)?;
            h.on_integer(1, 300, T_INT32)?;
            h.end_complex()
        });
        assert_eq!(bytes, vec![id(T_UNIFORM_ARRAY), id(T_INT32), 2, 1, 0xAC, 0x04]);
    }

    #[test]
    fn test_uniform_type_mismatch() {
        let mut buf = BinaryWriteBuffer::new(16);
        let mut h = WritingPofHandler::new(buf.buffer_output());
        h.begin_uniform_collection(0, 1, T_INT32).unwrap();
        assert!(h.on_char_string(0, "x").is_err());
    }

    #[test]
    fn test_uniform_map_alternates() {
        let bytes = encode(|h| {
            h.begin_uniform_map(0, 1, T_INT32, T_CHAR_STRING)?;
            h.on_integer(-1, 7, T_INT32)?;
            h.on_char_string(-1, "a")?;
            h.end_complex()
        });
        assert_eq!(
            bytes,
            vec![id(T_UNIFORM_MAP), id(T_INT32), id(T_CHAR_STRING), 1, 7, 1, b'a']
        );
    }

    #[test]
    fn test_empty_collection() {
        let bytes = encode(|h| {
            h.begin_collection(0, 0)?;
            h.end_complex()
        });
        assert_eq!(bytes, vec![id(V_COLLECTION_EMPTY)]);

        // skipped entirely inside a user type
        let bytes = encode(|h| {
            h.begin_user_type(0, -1, 1, 0)?;
            h.on_integer(0, 9, T_INT32)?;
            h.begin_array(1, 0)?;
            h.end_complex()?;
            h.end_complex()
        });
        assert_eq!(bytes, vec![1, 0, 0, id(T_INT32), 9, id(PROPERTY_END)]);
    }

    #[test]
    fn test_identity_header() {
        let bytes = encode(|h| {
            h.begin_user_type(0, 3, 12, 1)?;
            h.end_complex()
        });
        assert_eq!(bytes, vec![id(T_IDENTITY), 3, 12, 1, id(PROPERTY_END)]);
    }

    #[test]
    fn test_end_without_complex() {
        let mut buf = BinaryWriteBuffer::new(4);
        let mut h = WritingPofHandler::new(buf.buffer_output());
        assert!(h.end_complex().is_err());
    }
}
