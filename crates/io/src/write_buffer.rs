//! Growable write buffer and its sequential output cursor.
//!
//! A [`BinaryWriteBuffer`] grows on demand up to an optional maximum
//! capacity. Sequential writes go through a [`BufferOutput`], which mutably
//! borrows the buffer: only one output can exist per buffer at a time.
//! Finished content is snapshotted into an immutable [`Binary`].

use crate::packed::{encode_packed, MAX_PACKED_LEN};
use crate::utf::encode_char16;
use byteorder::{BigEndian, ByteOrder};
use gridwire_core::{check_range, Binary, Error, Result};

/// Append-oriented byte buffer.
#[derive(Debug, Clone, Default)]
pub struct BinaryWriteBuffer {
    data: Vec<u8>,
    max_capacity: usize,
}

impl BinaryWriteBuffer {
    /// Create a buffer with an initial capacity and no maximum.
    pub fn new(capacity: usize) -> Self {
        Self::with_max_capacity(capacity, usize::MAX)
    }

    /// Create a buffer that refuses to grow past `max_capacity`.
    pub fn with_max_capacity(capacity: usize, max_capacity: usize) -> Self {
        BinaryWriteBuffer {
            data: Vec::with_capacity(capacity.min(max_capacity)),
            max_capacity,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Largest size the buffer may grow to.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// The written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Write `bytes` at `offset`, overwriting and extending as needed.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `offset` is past the current end (which
    /// would leave a gap) or if the result would exceed the maximum capacity.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::out_of_bounds(offset, bytes.len(), self.data.len()));
        }
        check_range(offset, bytes.len(), self.max_capacity)?;

        let overlap = (self.data.len() - offset).min(bytes.len());
        self.data[offset..offset + overlap].copy_from_slice(&bytes[..overlap]);
        self.data.extend_from_slice(&bytes[overlap..]);
        Ok(())
    }

    /// Keep only `[offset, offset + len)`, moving it to the start.
    pub fn retain(&mut self, offset: usize, len: usize) -> Result<()> {
        check_range(offset, len, self.data.len())?;
        self.data.drain(..offset);
        self.data.truncate(len);
        Ok(())
    }

    /// Discard all content.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Copy the content into an immutable snapshot.
    pub fn to_binary(&self) -> Binary {
        Binary::from(self.data.clone())
    }

    /// Convert into an immutable binary without copying.
    pub fn into_binary(self) -> Binary {
        Binary::from(self.data)
    }

    /// Open an output cursor positioned at the end of the content.
    pub fn buffer_output(&mut self) -> BufferOutput<'_> {
        let offset = self.data.len();
        BufferOutput { buf: self, offset }
    }

    /// Open an output cursor at `offset`.
    pub fn buffer_output_at(&mut self, offset: usize) -> Result<BufferOutput<'_>> {
        if offset > self.data.len() {
            return Err(Error::out_of_bounds(offset, 0, self.data.len()));
        }
        Ok(BufferOutput { buf: self, offset })
    }
}

/// Sequential writer over a [`BinaryWriteBuffer`].
#[derive(Debug)]
pub struct BufferOutput<'a> {
    buf: &'a mut BinaryWriteBuffer,
    offset: usize,
}

impl<'a> BufferOutput<'a> {
    /// Current position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Move to an absolute position within the written content.
    pub fn set_offset(&mut self, offset: usize) -> Result<()> {
        if offset > self.buf.len() {
            return Err(Error::out_of_bounds(offset, 0, self.buf.len()));
        }
        self.offset = offset;
        Ok(())
    }

    /// A cursor at the same position that borrows this one. Writes through
    /// it do not move this cursor; use [`set_offset`](Self::set_offset) to
    /// catch up afterwards.
    pub fn reborrow(&mut self) -> BufferOutput<'_> {
        BufferOutput {
            buf: &mut *self.buf,
            offset: self.offset,
        }
    }

    /// The underlying buffer.
    pub fn buffer(&self) -> &BinaryWriteBuffer {
        self.buf
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.write_at(self.offset, bytes)?;
        self.offset += bytes.len();
        Ok(())
    }

    /// Write one octet.
    pub fn write_u8(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    /// Write a single-octet boolean.
    pub fn write_bool(&mut self, f: bool) -> Result<()> {
        self.write_u8(f as u8)
    }

    fn write_packed(&mut self, n: i64) -> Result<()> {
        let mut tmp = [0u8; MAX_PACKED_LEN];
        let len = encode_packed(n, &mut tmp);
        self.write_bytes(&tmp[..len])
    }

    /// Write a packed 16-bit integer.
    pub fn write_i16(&mut self, n: i16) -> Result<()> {
        self.write_packed(n as i64)
    }

    /// Write a packed 32-bit integer.
    pub fn write_i32(&mut self, n: i32) -> Result<()> {
        self.write_packed(n as i64)
    }

    /// Write a packed 64-bit integer.
    pub fn write_i64(&mut self, n: i64) -> Result<()> {
        self.write_packed(n)
    }

    /// Write a 4-byte big-endian IEEE-754 float.
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        let mut tmp = [0u8; 4];
        BigEndian::write_f32(&mut tmp, v);
        self.write_bytes(&tmp)
    }

    /// Write an 8-byte big-endian IEEE-754 float.
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        let mut tmp = [0u8; 8];
        BigEndian::write_f64(&mut tmp, v);
        self.write_bytes(&tmp)
    }

    /// Write one 16-bit character as UTF-8.
    pub fn write_char16(&mut self, ch: u16) -> Result<()> {
        let mut tmp = [0u8; 3];
        let len = encode_char16(ch, &mut tmp);
        self.write_bytes(&tmp[..len])
    }

    /// Write a length-prefixed UTF-8 string; `None` is written as length -1.
    pub fn write_string(&mut self, s: Option<&str>) -> Result<()> {
        match s {
            None => self.write_i32(-1),
            Some(s) => {
                let len = i32::try_from(s.len()).map_err(|_| {
                    Error::illegal_argument(format!("string of {} bytes is too long", s.len()))
                })?;
                self.write_i32(len)?;
                self.write_bytes(s.as_bytes())
            }
        }
    }

    /// Copy the content of another buffer.
    pub fn write_buffer(&mut self, bin: &Binary) -> Result<()> {
        self.write_bytes(bin.as_slice())
    }
}
