//! Serializer trait.

use crate::buffer_input::BufferInput;
use crate::write_buffer::BufferOutput;
use gridwire_core::Result;

/// Converts values to and from a byte stream.
///
/// A value written by one serializer must be read back by an instance of
/// the same serializer type; the stream carries no self-description beyond
/// what the implementation writes.
///
/// # Thread Safety
///
/// Serializers are shared across threads and must be `Send + Sync`. Each
/// call operates on its own cursor, so implementations hold no per-call
/// state.
pub trait Serializer: Send + Sync {
    /// Type of value this serializer handles.
    type Value;

    /// Write `value` to `out`.
    fn serialize(&self, out: &mut BufferOutput<'_>, value: &Self::Value) -> Result<()>;

    /// Read a value from `input`.
    fn deserialize(&self, input: &mut BufferInput) -> Result<Self::Value>;
}
