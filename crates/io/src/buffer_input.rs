//! Sequential reader over a [`Binary`].
//!
//! A `BufferInput` owns a cheap clone of the buffer it reads plus a cursor,
//! so it never borrows from its source and any number of inputs may walk
//! the same bytes at once.
//!
//! Running off the end of the buffer is reported as `Eof`, never as
//! `IndexOutOfBounds`: a decode loop that hits the end of its data has found
//! a truncated stream, not a bad caller offset.

use crate::packed::{decode_packed, Unpacked};
use crate::utf::{decode_char16, decode_string, Decoded};
use byteorder::{BigEndian, ByteOrder};
use gridwire_core::{Binary, Error, Result};

/// Sequential cursor over an immutable buffer.
#[derive(Debug, Clone)]
pub struct BufferInput {
    buf: Binary,
    offset: usize,
    mark: usize,
}

impl BufferInput {
    /// Open a cursor at the start of `buf`.
    pub fn new(buf: Binary) -> Self {
        BufferInput {
            buf,
            offset: 0,
            mark: 0,
        }
    }

    /// The buffer being read.
    pub fn buffer(&self) -> &Binary {
        &self.buf
    }

    /// Current position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `offset` is past the end of the buffer.
    pub fn set_offset(&mut self, offset: usize) -> Result<()> {
        if offset > self.buf.len() {
            return Err(Error::out_of_bounds(offset, 0, self.buf.len()));
        }
        self.offset = offset;
        Ok(())
    }

    /// Bytes left to read.
    pub fn available(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Remember the current position.
    pub fn mark(&mut self) {
        self.mark = self.offset;
    }

    /// Return to the last marked position (the start if never marked).
    pub fn reset(&mut self) {
        self.offset = self.mark;
    }

    fn remaining(&self) -> &[u8] {
        &self.buf.as_slice()[self.offset..]
    }

    fn require(&self, len: usize, what: &str) -> Result<()> {
        if len > self.available() {
            return Err(Error::eof(
                self.offset,
                format!("{} needs {} bytes, {} available", what, len, self.available()),
            ));
        }
        Ok(())
    }

    /// Skip `len` bytes.
    ///
    /// # Errors
    ///
    /// If fewer than `len` bytes remain, the cursor moves to the end of the
    /// buffer and `Eof` is returned.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        if len > self.available() {
            let from = self.offset;
            self.offset = self.buf.len();
            return Err(Error::eof(from, format!("skip of {} bytes", len)));
        }
        self.offset += len;
        Ok(())
    }

    /// Read one octet.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1, "octet")?;
        let b = self.buf.as_slice()[self.offset];
        self.offset += 1;
        Ok(b)
    }

    /// Read a single-octet boolean.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Fill `dest` from the stream.
    pub fn read_into(&mut self, dest: &mut [u8]) -> Result<()> {
        self.require(dest.len(), "octet run")?;
        dest.copy_from_slice(&self.remaining()[..dest.len()]);
        self.offset += dest.len();
        Ok(())
    }

    /// Read `len` bytes into a new vector.
    pub fn read_octets(&mut self, len: usize) -> Result<Vec<u8>> {
        self.require(len, "octet run")?;
        let v = self.remaining()[..len].to_vec();
        self.offset += len;
        Ok(v)
    }

    /// Read `len` bytes as a view sharing the underlying buffer.
    pub fn read_binary(&mut self, len: usize) -> Result<Binary> {
        self.require(len, "binary")?;
        let bin = self.buf.slice(self.offset, len)?;
        self.offset += len;
        Ok(bin)
    }

    fn read_packed(&mut self) -> Result<i64> {
        match decode_packed(self.remaining()) {
            Unpacked::Value(n, used) => {
                self.offset += used;
                Ok(n)
            }
            Unpacked::Truncated => {
                let from = self.offset;
                self.offset = self.buf.len();
                Err(Error::eof(from, "packed integer"))
            }
            Unpacked::Overlong => Err(Error::format(self.offset, "malformed packed integer")),
        }
    }

    /// Read a packed 16-bit integer.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_packed()? as i16)
    }

    /// Read a packed 32-bit integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_packed()? as i32)
    }

    /// Read a packed 64-bit integer.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_packed()
    }

    /// Read a 4-byte big-endian IEEE-754 float.
    pub fn read_f32(&mut self) -> Result<f32> {
        self.require(4, "float32")?;
        let v = BigEndian::read_f32(self.remaining());
        self.offset += 4;
        Ok(v)
    }

    /// Read an 8-byte big-endian IEEE-754 float.
    pub fn read_f64(&mut self) -> Result<f64> {
        self.require(8, "float64")?;
        let v = BigEndian::read_f64(self.remaining());
        self.offset += 8;
        Ok(v)
    }

    /// Read one UTF-8 encoded 16-bit character.
    pub fn read_char16(&mut self) -> Result<u16> {
        match decode_char16(self.remaining(), self.offset)? {
            Decoded::Char(ch, used) => {
                self.offset += used;
                Ok(ch)
            }
            Decoded::Truncated => {
                let from = self.offset;
                self.offset = self.buf.len();
                Err(Error::eof(from, "UTF-8 character"))
            }
        }
    }

    /// Read a length-prefixed UTF-8 string; a length of -1 is `None`.
    ///
    /// # Errors
    ///
    /// Returns `Format` for a negative length other than -1, `Eof` if the
    /// content is truncated and `UtfDataFormat` for invalid UTF-8.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let start = self.offset;
        let len = self.read_i32()?;
        match len {
            -1 => Ok(None),
            n if n < 0 => Err(Error::format(start, format!("illegal string length: {}", n))),
            n => Ok(Some(self.read_utf(n as usize)?)),
        }
    }

    /// Read `len` bytes of UTF-8 content.
    pub fn read_utf(&mut self, len: usize) -> Result<String> {
        self.require(len, "string")?;
        let s = decode_string(&self.remaining()[..len], self.offset)?;
        self.offset += len;
        Ok(s)
    }
}
