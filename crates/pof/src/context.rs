//! Type registry and the POF entry point.
//!
//! A [`PofContext`] maps user type ids to [`PofSerializer`]s and Rust types
//! to user type ids. [`SimplePofContext`] is the standard implementation;
//! it also implements the byte-level [`Serializer`] trait, so it plugs into
//! [`SerializationHelper`](gridwire_io::SerializationHelper).

use crate::portable::PortableObject;
use crate::reader::{PofBufferReader, PofReader};
use crate::value::{PofObject, PofValue};
use crate::writer::{PofBufferWriter, PofWriter};
use gridwire_core::{Error, GridwireConfig, Result};
use gridwire_io::{BufferInput, BufferOutput, Serializer};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Writes and reads one user type.
pub trait PofSerializer: Send + Sync {
    /// Write `value`'s properties, then its remainder.
    fn serialize(&self, writer: &mut PofWriter<'_, '_>, value: &dyn PortableObject) -> Result<()>;

    /// Construct an instance and read its properties.
    fn deserialize(&self, reader: &mut PofReader<'_, '_>) -> Result<PofObject>;
}

/// Registry of user types.
pub trait PofContext: Send + Sync {
    /// Serializer for a user type id.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if the id is not registered.
    fn serializer(&self, type_id: i32) -> Result<&dyn PofSerializer>;

    /// User type id of an object.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if the object's type is not registered.
    fn user_type_id(&self, value: &dyn PortableObject) -> Result<i32>;

    /// True if top-level serialization should track object identities.
    fn is_reference_enabled(&self) -> bool;
}

/// Serializer for types that implement [`PortableObject`] and `Default`.
///
/// Evolvable objects are written at the greater of their data and
/// implementation versions, followed by their future data; on the way in,
/// the stream version and unread properties are stored back on the object.
pub struct PortableObjectSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> PortableObjectSerializer<T> {
    /// Create the serializer.
    pub fn new() -> Self {
        PortableObjectSerializer {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PortableObjectSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PortableObject + Default> PofSerializer for PortableObjectSerializer<T> {
    fn serialize(&self, writer: &mut PofWriter<'_, '_>, value: &dyn PortableObject) -> Result<()> {
        let evolvable = value.as_evolvable();
        if let Some(e) = evolvable {
            writer.set_version_id(e.data_version().max(e.impl_version()))?;
        }
        value.write_external(writer)?;
        writer.write_remainder(evolvable.and_then(|e| e.future_data()))
    }

    fn deserialize(&self, reader: &mut PofReader<'_, '_>) -> Result<PofObject> {
        let obj = PofObject::new(T::default());
        reader.register_identity(&obj)?;
        {
            let mut guard = obj.write();
            let value: &mut dyn PortableObject = &mut **guard;
            let version = reader.version_id()?;
            if let Some(e) = value.as_evolvable_mut() {
                e.set_data_version(version);
            }
            value.read_external(reader)?;
            let remainder = reader.read_remainder()?;
            if let Some(e) = value.as_evolvable_mut() {
                e.set_future_data(remainder);
            }
        }
        Ok(obj)
    }
}

/// Explicitly populated [`PofContext`].
#[derive(Default)]
pub struct SimplePofContext {
    serializers: HashMap<i32, Box<dyn PofSerializer>>,
    type_ids: HashMap<TypeId, i32>,
    reference_enabled: bool,
}

impl SimplePofContext {
    /// Create an empty context with references disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty context configured from the `[pof]` section.
    pub fn from_config(config: &GridwireConfig) -> Self {
        let mut ctx = Self::new();
        ctx.set_reference_enabled(config.pof.reference_enabled);
        ctx
    }

    /// Register `T` under `type_id`, serialized through its
    /// [`PortableObject`] implementation.
    pub fn register_user_type<T: PortableObject + Default>(&mut self, type_id: i32) -> Result<()> {
        self.register_serializer::<T, _>(type_id, PortableObjectSerializer::<T>::new())
    }

    /// Register `T` under `type_id` with a custom serializer.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` for a negative id, an id already in use,
    /// or a type already registered.
    pub fn register_serializer<T: 'static, S: PofSerializer + 'static>(
        &mut self,
        type_id: i32,
        serializer: S,
    ) -> Result<()> {
        if type_id < 0 {
            return Err(Error::illegal_argument(format!(
                "negative user type identifier: {}",
                type_id
            )));
        }
        if self.serializers.contains_key(&type_id) {
            return Err(Error::illegal_argument(format!(
                "duplicate user type identifier: {}",
                type_id
            )));
        }
        let key = TypeId::of::<T>();
        if let Some(existing) = self.type_ids.get(&key) {
            return Err(Error::illegal_argument(format!(
                "{} is already registered as user type {}",
                std::any::type_name::<T>(),
                existing
            )));
        }
        debug!(type_id, type_name = std::any::type_name::<T>(), "registered user type");
        self.serializers.insert(type_id, Box::new(serializer));
        self.type_ids.insert(key, type_id);
        Ok(())
    }

    /// True if `type_id` is registered.
    pub fn is_user_type(&self, type_id: i32) -> bool {
        self.serializers.contains_key(&type_id)
    }

    /// Enable or disable identity tracking for top-level serialization.
    pub fn set_reference_enabled(&mut self, enabled: bool) {
        self.reference_enabled = enabled;
    }
}

impl fmt::Debug for SimplePofContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.serializers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("SimplePofContext")
            .field("type_ids", &ids)
            .field("reference_enabled", &self.reference_enabled)
            .finish()
    }
}

impl PofContext for SimplePofContext {
    fn serializer(&self, type_id: i32) -> Result<&dyn PofSerializer> {
        self.serializers
            .get(&type_id)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::illegal_argument(format!("unknown user type: {}", type_id)))
    }

    fn user_type_id(&self, value: &dyn PortableObject) -> Result<i32> {
        self.type_ids
            .get(&value.as_any().type_id())
            .copied()
            .ok_or_else(|| {
                Error::illegal_argument(format!("unknown user type: {}", value.type_name()))
            })
    }

    fn is_reference_enabled(&self) -> bool {
        self.reference_enabled
    }
}

impl Serializer for SimplePofContext {
    type Value = PofValue;

    fn serialize(&self, out: &mut BufferOutput<'_>, value: &PofValue) -> Result<()> {
        let end = {
            let mut writer = PofBufferWriter::new(out.reborrow(), self);
            // evolvable objects never carry identities
            if self.reference_enabled && !value.is_evolvable() {
                writer.enable_reference();
            }
            writer.write_object(0, value)?;
            writer.offset()
        };
        out.set_offset(end)
    }

    fn deserialize(&self, input: &mut BufferInput) -> Result<PofValue> {
        let mut reader = PofBufferReader::new(input.clone(), self);
        let value = reader.read_object(0)?;
        input.set_offset(reader.offset())?;
        Ok(value)
    }
}
