//! Dynamically typed POF values.
//!
//! [`PofValue`] is what [`PofWriter::write_object`](crate::PofWriter::write_object)
//! accepts and [`PofReader::read_object`](crate::PofReader::read_object)
//! returns. User types travel as [`PofObject`], a shared handle whose
//! equality is identity: two handles are equal only when they point at the
//! same object, which is also what the reference library keys on.

use crate::portable::PortableObject;
use crate::raw::{RawDate, RawDateTime, RawDayTimeInterval, RawTime, RawTimeInterval, RawYearMonthInterval};
use gridwire_core::Binary;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a user-type instance.
///
/// Object graphs may be cyclic; a cycle of `PofObject`s keeps itself alive
/// until one of the links is cleared.
#[derive(Clone)]
pub struct PofObject(Arc<RwLock<Box<dyn PortableObject>>>);

impl PofObject {
    /// Wrap a portable object.
    pub fn new<T: PortableObject>(value: T) -> Self {
        PofObject(Arc::new(RwLock::new(Box::new(value))))
    }

    /// Wrap an already boxed portable object.
    pub fn from_box(value: Box<dyn PortableObject>) -> Self {
        PofObject(Arc::new(RwLock::new(value)))
    }

    /// Shared access to the object.
    ///
    /// Read locks are taken recursively, so a graph that reaches the same
    /// object twice can be walked while an outer guard is still held.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn PortableObject>> {
        self.0.read_recursive()
    }

    /// Exclusive access to the object.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn PortableObject>> {
        self.0.write()
    }

    /// True if both handles point at the same object.
    pub fn ptr_eq(&self, other: &PofObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared object; stable for the life of the handle.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Run `f` on the object if it is a `T`.
    pub fn with<T: PortableObject, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.read();
        let obj: &dyn PortableObject = &**guard;
        obj.as_any().downcast_ref::<T>().map(f)
    }

    /// Run `f` on the object mutably if it is a `T`.
    pub fn with_mut<T: PortableObject, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.write();
        let obj: &mut dyn PortableObject = &mut **guard;
        obj.as_any_mut().downcast_mut::<T>().map(f)
    }

    /// True if the object is [`Evolvable`](crate::Evolvable).
    pub fn is_evolvable(&self) -> bool {
        let guard = self.read();
        let obj: &dyn PortableObject = &**guard;
        obj.as_evolvable().is_some()
    }
}

impl PartialEq for PofObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for PofObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // a cyclic graph would recurse forever through the object's own Debug
        match self.0.try_read_recursive() {
            Some(guard) => {
                let obj: &dyn PortableObject = &**guard;
                write!(f, "PofObject<{}>@{:#x}", obj.type_name(), self.identity())
            }
            None => write!(f, "PofObject@{:#x}", self.identity()),
        }
    }
}

/// A POF value of any type.
#[derive(Debug, Clone, PartialEq)]
pub enum PofValue {
    /// Null reference
    Null,
    /// Boolean
    Bool(bool),
    /// Single octet
    Octet(u8),
    /// 16-bit character
    Char(u16),
    /// 16-bit integer
    Int16(i16),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer
    Int64(i64),
    /// 32-bit float
    Float32(f32),
    /// 64-bit float
    Float64(f64),
    /// Octet string
    Binary(Binary),
    /// Character string
    String(String),
    /// Date
    Date(RawDate),
    /// Time of day
    Time(RawTime),
    /// Date and time
    DateTime(RawDateTime),
    /// Year-month interval
    YearMonthInterval(RawYearMonthInterval),
    /// Time interval
    TimeInterval(RawTimeInterval),
    /// Day-time interval
    DayTimeInterval(RawDayTimeInterval),
    /// Uniform boolean array
    BoolArray(Vec<bool>),
    /// Uniform character array
    Char16Array(Vec<u16>),
    /// Uniform 16-bit integer array
    Int16Array(Vec<i16>),
    /// Uniform 32-bit integer array
    Int32Array(Vec<i32>),
    /// Uniform 64-bit integer array
    Int64Array(Vec<i64>),
    /// Uniform 32-bit float array
    Float32Array(Vec<f32>),
    /// Uniform 64-bit float array
    Float64Array(Vec<f64>),
    /// Array of values of any type
    Array(Vec<PofValue>),
    /// Collection of values of any type
    Collection(Vec<PofValue>),
    /// Positional array; absent positions are null
    SparseArray(BTreeMap<i32, PofValue>),
    /// Key/value pairs in stream order
    Map(Vec<(PofValue, PofValue)>),
    /// User-type instance
    Object(PofObject),
}

impl PofValue {
    /// True for [`PofValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, PofValue::Null)
    }

    /// The user-type handle, if this is one.
    pub fn as_object(&self) -> Option<&PofObject> {
        match self {
            PofValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PofValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// True if this is an evolvable user type.
    pub fn is_evolvable(&self) -> bool {
        self.as_object().map_or(false, PofObject::is_evolvable)
    }

    /// Identity comparison for objects, value comparison otherwise.
    pub(crate) fn same_identity(&self, other: &PofValue) -> bool {
        match (self, other) {
            (PofValue::Object(a), PofValue::Object(b)) => a.ptr_eq(b),
            (a, b) => a == b,
        }
    }
}

impl From<bool> for PofValue {
    fn from(v: bool) -> Self {
        PofValue::Bool(v)
    }
}

impl From<i16> for PofValue {
    fn from(v: i16) -> Self {
        PofValue::Int16(v)
    }
}

impl From<i32> for PofValue {
    fn from(v: i32) -> Self {
        PofValue::Int32(v)
    }
}

impl From<i64> for PofValue {
    fn from(v: i64) -> Self {
        PofValue::Int64(v)
    }
}

impl From<f32> for PofValue {
    fn from(v: f32) -> Self {
        PofValue::Float32(v)
    }
}

impl From<f64> for PofValue {
    fn from(v: f64) -> Self {
        PofValue::Float64(v)
    }
}

impl From<&str> for PofValue {
    fn from(v: &str) -> Self {
        PofValue::String(v.to_string())
    }
}

impl From<String> for PofValue {
    fn from(v: String) -> Self {
        PofValue::String(v)
    }
}

impl From<Binary> for PofValue {
    fn from(v: Binary) -> Self {
        PofValue::Binary(v)
    }
}

impl From<PofObject> for PofValue {
    fn from(v: PofObject) -> Self {
        PofValue::Object(v)
    }
}

impl<T: Into<PofValue>> From<Option<T>> for PofValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(PofValue::Null, Into::into)
    }
}
