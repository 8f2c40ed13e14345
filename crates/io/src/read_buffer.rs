//! Random-access read buffers.

use crate::buffer_input::BufferInput;
use gridwire_core::{check_range, Binary, Error, Result};

/// Read-only, random-access view over a byte range.
///
/// Every accessor validates `offset + length <= len()` and fails with
/// `IndexOutOfBounds` otherwise. Sequential access goes through a
/// [`BufferInput`] cursor; any number of cursors may read one buffer
/// concurrently since the buffer itself is immutable.
pub trait ReadBuffer {
    /// Number of readable bytes.
    fn len(&self) -> usize;

    /// True if the buffer holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The readable bytes.
    fn bytes(&self) -> &[u8];

    /// Read the byte at `offset`.
    fn read_at(&self, offset: usize) -> Result<u8> {
        self.bytes()
            .get(offset)
            .copied()
            .ok_or_else(|| Error::out_of_bounds(offset, 1, self.len()))
    }

    /// Copy bytes `[begin, end)` into `dest` starting at `dest_offset`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if the source range is inverted or outside
    /// this buffer, or if it does not fit in `dest`.
    fn read_range(&self, begin: usize, end: usize, dest: &mut [u8], dest_offset: usize) -> Result<()> {
        if begin > end {
            return Err(Error::out_of_bounds(begin, 0, end));
        }
        let len = end - begin;
        check_range(begin, len, self.len())?;
        check_range(dest_offset, len, dest.len())?;
        dest[dest_offset..dest_offset + len].copy_from_slice(&self.bytes()[begin..end]);
        Ok(())
    }

    /// Copy `[offset, offset + len)` into a new vector.
    fn to_octet_array(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        check_range(offset, len, self.len())?;
        Ok(self.bytes()[offset..offset + len].to_vec())
    }

    /// Snapshot `[offset, offset + len)` as an immutable binary.
    fn to_binary(&self, offset: usize, len: usize) -> Result<Binary>;

    /// Return a read buffer over `[offset, offset + len)`.
    fn read_buffer(&self, offset: usize, len: usize) -> Result<Binary> {
        self.to_binary(offset, len)
    }

    /// Open a sequential cursor at offset 0.
    fn buffer_input(&self) -> BufferInput;
}

impl ReadBuffer for Binary {
    fn len(&self) -> usize {
        Binary::len(self)
    }

    fn bytes(&self) -> &[u8] {
        self.as_slice()
    }

    /// Sub-views of a `Binary` share its storage rather than copying.
    fn to_binary(&self, offset: usize, len: usize) -> Result<Binary> {
        self.slice(offset, len)
    }

    fn buffer_input(&self) -> BufferInput {
        BufferInput::new(self.clone())
    }
}
