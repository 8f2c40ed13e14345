//! User-type traits.
//!
//! A type takes part in POF serialization by implementing
//! [`PortableObject`] and being registered with a
//! [`SimplePofContext`](crate::SimplePofContext). Types that must survive
//! schema changes additionally expose an [`Evolvable`] view, usually by
//! embedding an [`EvolvableData`].
//!
//! # Example
//!
//! ```ignore
//! #[derive(Debug, Default)]
//! struct Person {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl PortableObject for Person {
//!     fn read_external(&mut self, reader: &mut PofReader<'_, '_>) -> Result<()> {
//!         self.name = reader.read_string(0)?.unwrap_or_default();
//!         self.age = reader.read_i32(1)?;
//!         Ok(())
//!     }
//!
//!     fn write_external(&self, writer: &mut PofWriter<'_, '_>) -> Result<()> {
//!         writer.write_string(0, &self.name)?;
//!         writer.write_i32(1, self.age)
//!     }
//! }
//! ```

use crate::reader::PofReader;
use crate::writer::PofWriter;
use gridwire_core::{Binary, Result};
use std::any::Any;
use std::fmt;

/// Downcasting support for trait objects.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Name of the concrete type, for diagnostics
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A type that reads and writes its own properties.
pub trait PortableObject: AsAny + Send + Sync + fmt::Debug {
    /// Restore state from `reader`, reading properties in ascending order.
    fn read_external(&mut self, reader: &mut PofReader<'_, '_>) -> Result<()>;

    /// Write state to `writer`, writing properties in ascending order.
    fn write_external(&self, writer: &mut PofWriter<'_, '_>) -> Result<()>;

    /// The evolvable view of this object, if it has one.
    fn as_evolvable(&self) -> Option<&dyn Evolvable> {
        None
    }

    /// Mutable evolvable view.
    fn as_evolvable_mut(&mut self) -> Option<&mut dyn Evolvable> {
        None
    }
}

/// An object that carries properties written by newer versions of itself.
///
/// The serializer stores the stream's version in `data_version` and any
/// properties past the ones this implementation knows in `future_data`;
/// both are written back unchanged, so an old reader/writer in the middle
/// of a round trip does not lose data.
pub trait Evolvable {
    /// Version of the implementing type.
    fn impl_version(&self) -> i32;

    /// Version of the data this instance was read from.
    fn data_version(&self) -> i32;

    /// Record the version of the data being read.
    fn set_data_version(&mut self, version: i32);

    /// Unknown trailing properties.
    fn future_data(&self) -> Option<&Binary>;

    /// Record unknown trailing properties.
    fn set_future_data(&mut self, data: Option<Binary>);
}

/// Ready-made [`Evolvable`] state to embed in a portable type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvolvableData {
    impl_version: i32,
    data_version: i32,
    future_data: Option<Binary>,
}

impl EvolvableData {
    /// State for an implementation at `impl_version`.
    pub fn new(impl_version: i32) -> Self {
        EvolvableData {
            impl_version,
            data_version: 0,
            future_data: None,
        }
    }
}

impl Evolvable for EvolvableData {
    fn impl_version(&self) -> i32 {
        self.impl_version
    }

    fn data_version(&self) -> i32 {
        self.data_version
    }

    fn set_data_version(&mut self, version: i32) {
        self.data_version = version;
    }

    fn future_data(&self) -> Option<&Binary> {
        self.future_data.as_ref()
    }

    fn set_future_data(&mut self, data: Option<Binary>) {
        self.future_data = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evolvable_data() {
        let mut e = EvolvableData::new(3);
        assert_eq!(e.impl_version(), 3);
        assert_eq!(e.data_version(), 0);
        assert!(e.future_data().is_none());

        e.set_data_version(5);
        e.set_future_data(Some(Binary::from(vec![1u8, 2])));
        assert_eq!(e.data_version(), 5);
        assert_eq!(e.future_data().map(|b| b.len()), Some(2));
    }

    #[test]
    fn test_as_any_type_name() {
        let x = 5u32;
        assert!(x.type_name().ends_with("u32"));
        assert_eq!(x.as_any().downcast_ref::<u32>(), Some(&5));
    }
}
