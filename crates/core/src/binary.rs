//! Immutable binary snapshots
//!
//! A [`Binary`] is a read-only view `[offset, offset + length)` over a
//! reference-counted byte array. Sub-views share the backing storage, so
//! slicing never copies; extracting owned bytes (`to_vec`) always does.

use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Immutable, cheaply clonable byte range.
#[derive(Clone)]
pub struct Binary {
    data: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl Binary {
    /// An empty binary.
    pub fn empty() -> Self {
        Binary {
            data: Arc::from(Vec::new()),
            offset: 0,
            len: 0,
        }
    }

    /// Create a view over an externally shared array.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `offset + len` exceeds the array length.
    pub fn from_shared(data: Arc<[u8]>, offset: usize, len: usize) -> Result<Self> {
        check_range(offset, len, data.len())?;
        Ok(Binary { data, offset, len })
    }

    /// Number of bytes in the view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the view holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the viewed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.len]
    }

    /// Copy the viewed bytes into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    /// Return a sub-view sharing the same backing array.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfBounds` if `offset + len > self.len()`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Binary> {
        check_range(offset, len, self.len)?;
        Ok(Binary {
            data: Arc::clone(&self.data),
            offset: self.offset + offset,
            len,
        })
    }
}

/// Validate that `[offset, offset + len)` lies within `bound`.
pub fn check_range(offset: usize, len: usize, bound: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= bound => Ok(()),
        _ => Err(Error::out_of_bounds(offset, len, bound)),
    }
}

impl Default for Binary {
    fn default() -> Self {
        Binary::empty()
    }
}

impl From<Vec<u8>> for Binary {
    fn from(v: Vec<u8>) -> Self {
        let len = v.len();
        Binary {
            data: Arc::from(v),
            offset: 0,
            len,
        }
    }
}

impl From<&[u8]> for Binary {
    fn from(v: &[u8]) -> Self {
        Binary::from(v.to_vec())
    }
}

impl AsRef<[u8]> for Binary {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for Binary {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Binary {}

impl Hash for Binary {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state)
    }
}

impl fmt::Debug for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_SHOWN: usize = 32;
        write!(f, "Binary(length={}, value=0x", self.len)?;
        for b in self.as_slice().iter().take(MAX_SHOWN) {
            write!(f, "{:02X}", b)?;
        }
        if self.len > MAX_SHOWN {
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_slice_shares_storage() {
        let bin = Binary::from(vec![1u8, 2, 3, 4, 5]);
        let sub = bin.slice(1, 3).unwrap();
        assert_eq!(sub.as_slice(), &[2, 3, 4]);

        let subsub = sub.slice(1, 2).unwrap();
        assert_eq!(subsub.as_slice(), &[3, 4]);
        assert!(Arc::ptr_eq(&bin.data, &subsub.data));
    }

    #[test]
    fn test_slice_bounds() {
        let bin = Binary::from(vec![0u8; 10]);
        assert!(bin.slice(8, 2).is_ok());
        let err = bin.slice(8, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexOutOfBounds);
    }

    #[test]
    fn test_from_shared_validates() {
        let data: Arc<[u8]> = Arc::from(vec![7u8; 4]);
        assert!(Binary::from_shared(Arc::clone(&data), 2, 2).is_ok());
        assert!(Binary::from_shared(data, 3, 2).is_err());
    }

    #[test]
    fn test_equality_ignores_backing_offset() {
        let a = Binary::from(vec![9u8, 1, 2]).slice(1, 2).unwrap();
        let b = Binary::from(vec![1u8, 2]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_debug_truncates() {
        let bin = Binary::from(vec![0xABu8; 40]);
        let s = format!("{:?}", bin);
        assert!(s.contains("length=40"));
        assert!(s.ends_with("...)"));
    }

    #[test]
    fn test_check_range_overflow() {
        assert!(check_range(usize::MAX, 2, 10).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_slice_matches_vec(
                data in prop::collection::vec(any::<u8>(), 0..64),
                offset in 0usize..80,
                len in 0usize..80,
            ) {
                let bin = Binary::from(data.clone());
                match bin.slice(offset, len) {
                    Ok(sub) => {
                        prop_assert!(offset + len <= data.len());
                        prop_assert_eq!(sub.as_slice(), &data[offset..offset + len]);
                    }
                    Err(err) => {
                        prop_assert!(offset + len > data.len());
                        prop_assert_eq!(err.kind(), ErrorKind::IndexOutOfBounds);
                    }
                }
            }
        }
    }
}
