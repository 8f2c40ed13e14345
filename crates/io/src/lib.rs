//! Byte-level I/O for gridwire
//!
//! This crate provides the buffers and codecs that the POF layer is built on:
//! - ReadBuffer: bounds-checked random access over immutable bytes
//! - BufferInput / BufferOutput: sequential cursors with the packed-integer
//!   and UTF-8 codecs built in
//! - BinaryWriteBuffer: growable buffer snapshotted into a `Binary`
//! - Serializer: the value <-> stream boundary
//! - SerializationHelper: format-byte framing and int decorations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer_input;
pub mod packed;
pub mod read_buffer;
pub mod serialization_helper;
pub mod serializer;
pub mod utf;
pub mod write_buffer;

pub use buffer_input::BufferInput;
pub use read_buffer::ReadBuffer;
pub use serialization_helper::{
    decorate_binary, extract_int_decoration, is_int_decorated, remove_int_decoration,
    SerializationHelper, FMT_BIN_DECO, FMT_BIN_EXT_DECO, FMT_EXT, FMT_IDO,
};
pub use serializer::Serializer;
pub use write_buffer::{BinaryWriteBuffer, BufferOutput};
