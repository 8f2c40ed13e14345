//! Binary framing for serialized values.
//!
//! ## Format
//!
//! ```text
//! plain:          [fmt_ext=21][payload]
//! int-decorated:  [fmt_ido=13][packed int32 decoration][original binary]
//! decorated:      [18][mask:u8][packed len][value binary]...
//!                 [19][mask:packed i64][packed len][value binary]...
//! ```
//!
//! The decoration helpers operate purely on the prefix and never look at
//! the payload. [`SerializationHelper`] adds size statistics per value type
//! so that repeated serialization pre-sizes its write buffer.

use crate::buffer_input::BufferInput;
use crate::read_buffer::ReadBuffer;
use crate::serializer::Serializer;
use crate::write_buffer::BinaryWriteBuffer;
use dashmap::DashMap;
use gridwire_core::{Binary, Error, Result};
use std::any::TypeId;
use std::time::{Duration, Instant};

/// Format byte for a value written by an explicit serializer.
pub const FMT_EXT: u8 = 21;

/// Format byte for an int-decorated binary.
pub const FMT_IDO: u8 = 13;

/// Format byte for a decorated binary with an 8-bit decoration mask.
pub const FMT_BIN_DECO: u8 = 18;

/// Format byte for a decorated binary with a 64-bit decoration mask.
pub const FMT_BIN_EXT_DECO: u8 = 19;

/// Decoration index of the undecorated value.
pub const DECO_VALUE: u32 = 0;

/// Statistics older than this are discarded.
pub const STATS_EXPIRY: Duration = Duration::from_secs(10 * 60);

const DEFAULT_BUFFER_SIZE: usize = 64;

/// Prefix `bin` with an int decoration.
pub fn decorate_binary(bin: &Binary, decoration: i32) -> Result<Binary> {
    let mut buf = BinaryWriteBuffer::new(6 + bin.len());
    {
        let mut out = buf.buffer_output();
        out.write_u8(FMT_IDO)?;
        out.write_i32(decoration)?;
        out.write_buffer(bin)?;
    }
    Ok(buf.into_binary())
}

/// True if `bin` starts with the int-decoration format byte.
pub fn is_int_decorated(bin: &Binary) -> bool {
    matches!(bin.read_at(0), Ok(FMT_IDO))
}

/// Read the int decoration of a decorated binary.
///
/// # Errors
///
/// Returns `IllegalArgument("invalid binary")` if the prefix is truncated.
pub fn extract_int_decoration(bin: &Binary) -> Result<i32> {
    let mut input = bin.buffer_input();
    let read = |input: &mut BufferInput| -> Result<i32> {
        input.read_u8()?;
        input.read_i32()
    };
    read(&mut input).map_err(|_| Error::illegal_argument("invalid binary"))
}

/// Strip the int decoration, returning the original binary.
///
/// # Errors
///
/// Returns `IllegalArgument("invalid binary")` if the prefix is truncated.
pub fn remove_int_decoration(bin: &Binary) -> Result<Binary> {
    let mut input = bin.buffer_input();
    let strip = |input: &mut BufferInput| -> Result<Binary> {
        input.read_u8()?;
        input.read_i32()?;
        let of = input.offset();
        bin.to_binary(of, bin.len() - of)
    };
    strip(&mut input).map_err(|_| Error::illegal_argument("invalid binary"))
}

/// Running size statistics for one value type.
#[derive(Debug, Clone)]
struct Stats {
    items: u32,
    total: u64,
    max: usize,
    created: Instant,
}

impl Stats {
    fn new() -> Self {
        Stats {
            items: 0,
            total: 0,
            max: 0,
            created: Instant::now(),
        }
    }

    /// Fold one observed size into the statistics.
    ///
    /// The statistics reset when the size strays more than 50% from the
    /// running average, and every 1024 items once they are older than
    /// [`STATS_EXPIRY`].
    fn update(&mut self, size: usize) {
        if self.items > 0 {
            let avg = self.total / self.items as u64;
            let drift = avg.abs_diff(size as u64);
            let reset = if drift > (size / 2) as u64 {
                true
            } else if self.items & 0x3FF == 0 {
                self.created.elapsed() > STATS_EXPIRY || self.items & 0xFFFF == 0
            } else {
                false
            };
            if reset {
                *self = Stats::new();
            }
        }
        self.items += 1;
        self.total += size as u64;
        self.max = self.max.max(size);
    }

    /// Buffer size for the next value: the recent maximum rounded up to 16.
    fn buffer_size(&self) -> usize {
        (self.max + 0xF) & !0xF
    }
}

/// Serializes values into framed binaries, remembering typical sizes.
#[derive(Debug, Default)]
pub struct SerializationHelper {
    stats: DashMap<TypeId, Stats>,
}

impl SerializationHelper {
    /// Create a helper with empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` behind an `FMT_EXT` format byte.
    pub fn to_binary<S>(&self, value: &S::Value, serializer: &S) -> Result<Binary>
    where
        S: Serializer,
        S::Value: 'static,
    {
        let key = TypeId::of::<S::Value>();
        let capacity = self
            .stats
            .get(&key)
            .map(|s| s.buffer_size())
            .unwrap_or(DEFAULT_BUFFER_SIZE);

        let mut buf = BinaryWriteBuffer::new(capacity);
        {
            let mut out = buf.buffer_output();
            out.write_u8(FMT_EXT)?;
            serializer.serialize(&mut out, value)?;
        }

        self.stats.entry(key).or_insert_with(Stats::new).update(buf.len());
        Ok(buf.into_binary())
    }

    /// Suggested initial buffer size for values of type `T`.
    pub fn buffer_size_hint<T: 'static>(&self) -> Option<usize> {
        self.stats.get(&TypeId::of::<T>()).map(|s| s.buffer_size())
    }

    /// Deserialize a binary produced by [`to_binary`](Self::to_binary),
    /// optionally int-decorated or wrapped in a decorated binary.
    ///
    /// # Errors
    ///
    /// Returns `Eof` if a decorated binary has no value decoration and
    /// `Format` if the format byte is not recognized.
    pub fn from_binary<S: Serializer>(&self, bin: &Binary, serializer: &S) -> Result<S::Value> {
        from_binary(bin, serializer)
    }
}

/// Deserialize a framed binary without touching any statistics.
pub fn from_binary<S: Serializer>(bin: &Binary, serializer: &S) -> Result<S::Value> {
    let mut input = bin.buffer_input();
    let mut format = input.read_u8()?;
    match format {
        FMT_IDO => {
            input.read_i32()?;
            format = input.read_u8()?;
        }
        FMT_BIN_DECO | FMT_BIN_EXT_DECO => {
            let mask = if format == FMT_BIN_DECO {
                input.read_u8()? as i64
            } else {
                input.read_i64()?
            };
            if mask & (1i64 << DECO_VALUE) == 0 {
                return Err(Error::eof(input.offset(), "Decorated value is missing a value"));
            }
            let len = input.read_i32()?;
            let len = usize::try_from(len).map_err(|_| {
                Error::format(input.offset(), format!("illegal decoration length: {}", len))
            })?;
            input = bin.read_buffer(input.offset(), len)?.buffer_input();
            format = input.read_u8()?;
        }
        _ => {}
    }

    if format == FMT_EXT {
        serializer.deserialize(&mut input)
    } else {
        Err(Error::format(0, "Illegal Binary format"))
    }
}
