//! POF writer sessions.
//!
//! A [`PofBufferWriter`] owns one write session: the output cursor, the
//! context, the reference library and a stack of user-type frames. All
//! writing happens through [`PofWriter`] handles, each bound to one frame
//! (depth 0 is the top level, outside any user type).
//!
//! A user-type frame moves through three stages:
//!
//! ```text
//! not begun -> header written -> ... properties (ascending) ... -> remainder written
//! ```
//!
//! The header (`[t_identity id] type-id version-id`) is written lazily on
//! the first property or at `write_remainder`, so `set_version_id` may be
//! called any time before that.
//!
//! A nested writer mutably borrows its parent handle, so the parent cannot
//! be touched while the child is alive. The parent's next operation closes
//! the child, terminating it if the child never wrote its remainder.

use crate::constants::*;
use crate::context::PofContext;
use crate::handler::WritingPofHandler;
use crate::portable::PortableObject;
use crate::raw::{RawDate, RawDateTime, RawDayTimeInterval, RawTime, RawTimeInterval, RawYearMonthInterval};
use crate::reference::ReferenceLibrary;
use crate::value::{PofObject, PofValue};
use gridwire_core::{Binary, Error, Result};
use gridwire_io::BufferOutput;
use std::collections::BTreeMap;
use tracing::trace;

/// Deepest user-type nesting a session accepts. Without references, a
/// cyclic graph would otherwise recurse until the stack overflows.
pub const MAX_NESTING: usize = 256;

#[derive(Debug)]
struct Frame {
    type_id: i32,
    identity: i32,
    version_id: i32,
    position: i32,
    header_written: bool,
    ended: bool,
    prev_prop: i32,
    evolvable: bool,
    nested_prop: Option<i32>,
}

impl Frame {
    fn new(type_id: i32, identity: i32, position: i32, evolvable: bool) -> Self {
        Frame {
            type_id,
            identity,
            version_id: 0,
            position,
            header_written: false,
            ended: false,
            prev_prop: -1,
            evolvable,
            nested_prop: None,
        }
    }
}

/// Session state shared by every handle of one writer.
pub(crate) struct WriterState<'a> {
    handler: WritingPofHandler<'a>,
    ctx: &'a dyn PofContext,
    references: Option<ReferenceLibrary>,
    frames: Vec<Frame>,
}

impl<'a> WriterState<'a> {
    fn frame(&mut self, depth: usize) -> &mut Frame {
        &mut self.frames[depth - 1]
    }

    fn is_evolvable(&self, depth: usize) -> bool {
        depth > 0 && self.frames[depth - 1].evolvable
    }

    fn check_nesting(&self) -> Result<()> {
        if self.frames.len() >= MAX_NESTING {
            return Err(Error::illegal_state(format!(
                "user types nested deeper than {}; enable references for cyclic graphs",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn terminated(&self) -> Error {
        Error::eof(self.handler.offset(), "user type POF stream terminated")
    }

    /// Close every frame above `depth`, ending the property each one was
    /// opened for.
    fn close_above(&mut self, depth: usize) -> Result<()> {
        while self.frames.len() > depth {
            let child = self.frames.len();
            self.close_frame(child)?;
            if child > 1 {
                let parent = self.frame(child - 1);
                if let Some(prop) = parent.nested_prop.take() {
                    parent.prev_prop = prop;
                }
            }
        }
        Ok(())
    }

    /// Terminate the frame at `depth` if needed and pop it.
    fn close_frame(&mut self, depth: usize) -> Result<()> {
        self.close_above(depth)?;
        if !self.frame(depth).ended {
            self.write_header(depth)?;
            self.handler.end_complex()?;
        }
        self.frames.truncate(depth - 1);
        Ok(())
    }

    fn write_header(&mut self, depth: usize) -> Result<()> {
        let f = self.frame(depth);
        if f.header_written {
            return Ok(());
        }
        f.header_written = true;
        let (pos, id, type_id, version) = (f.position, f.identity, f.type_id, f.version_id);
        self.handler.begin_user_type(pos, id, type_id, version)
    }

    fn begin_property(&mut self, depth: usize, i: i32) -> Result<()> {
        self.close_above(depth)?;
        if depth == 0 {
            if i > 0 && !self.handler.in_complex() {
                return Err(Error::illegal_argument("not in a complex type"));
            }
            return Ok(());
        }
        if self.frame(depth).ended {
            return Err(self.terminated());
        }
        if i < 0 {
            return Err(Error::illegal_argument(format!("negative property index: {}", i)));
        }
        self.write_header(depth)?;
        let f = self.frame(depth);
        if i <= f.prev_prop {
            return Err(Error::illegal_argument(format!(
                "previous property index={}, requested property index={} while writing user type {}",
                f.prev_prop, i, f.type_id
            )));
        }
        Ok(())
    }

    fn end_property(&mut self, depth: usize, i: i32) {
        if depth > 0 {
            self.frame(depth).prev_prop = i;
        }
    }

    fn write_remainder(&mut self, depth: usize, data: Option<&Binary>) -> Result<()> {
        if depth == 0 {
            return Err(Error::illegal_state("not in a user type"));
        }
        self.close_above(depth)?;
        if self.frame(depth).ended {
            return Err(self.terminated());
        }
        self.write_header(depth)?;
        if let Some(bin) = data {
            self.handler.write_raw(bin)?;
        }
        self.handler.end_complex()?;
        self.frame(depth).ended = true;
        Ok(())
    }

    fn open_nested(&mut self, depth: usize, i: i32, type_id: i32) -> Result<()> {
        if depth == 0 {
            return Err(Error::illegal_state("not in a user type"));
        }
        self.check_nesting()?;
        self.begin_property(depth, i)?;
        self.handler.register_identity(-1)?;
        let parent = self.frame(depth);
        parent.nested_prop = Some(i);
        let evolvable = parent.evolvable;
        self.frames.push(Frame::new(type_id, -1, i, evolvable));
        Ok(())
    }

    // ========================================================================
    // Values
    // ========================================================================

    fn write_value(&mut self, depth: usize, pos: i32, value: &PofValue) -> Result<()> {
        let h = &mut self.handler;
        match value {
            PofValue::Null => h.on_null_reference(pos),
            PofValue::Bool(v) => h.on_bool(pos, *v),
            PofValue::Octet(v) => h.on_octet(pos, *v),
            PofValue::Char(v) => h.on_char(pos, *v),
            PofValue::Int16(v) => h.on_integer(pos, *v as i64, T_INT16),
            PofValue::Int32(v) => h.on_integer(pos, *v as i64, T_INT32),
            PofValue::Int64(v) => h.on_integer(pos, *v, T_INT64),
            PofValue::Float32(v) => h.on_f32(pos, *v),
            PofValue::Float64(v) => h.on_f64(pos, *v),
            PofValue::Binary(v) => h.on_octet_string(pos, v.as_slice()),
            PofValue::String(v) => h.on_char_string(pos, v),
            PofValue::Date(v) => h.on_date(pos, v),
            PofValue::Time(v) => h.on_time(pos, v),
            PofValue::DateTime(v) => h.on_date_time(pos, v),
            PofValue::YearMonthInterval(v) => h.on_year_month_interval(pos, v),
            PofValue::TimeInterval(v) => h.on_time_interval(pos, v),
            PofValue::DayTimeInterval(v) => h.on_day_time_interval(pos, v),
            PofValue::BoolArray(v) => {
                self.write_typed_array(pos, T_BOOLEAN, v.as_slice(), |h, n, x| h.on_bool(n, x))
            }
            PofValue::Char16Array(v) => {
                self.write_typed_array(pos, T_CHAR, v.as_slice(), |h, n, x| h.on_char(n, x))
            }
            PofValue::Int16Array(v) => self.write_typed_array(pos, T_INT16, v.as_slice(), |h, n, x| {
                h.on_integer(n, x as i64, T_INT16)
            }),
            PofValue::Int32Array(v) => self.write_typed_array(pos, T_INT32, v.as_slice(), |h, n, x| {
                h.on_integer(n, x as i64, T_INT32)
            }),
            PofValue::Int64Array(v) => {
                self.write_typed_array(pos, T_INT64, v.as_slice(), |h, n, x| h.on_integer(n, x, T_INT64))
            }
            PofValue::Float32Array(v) => {
                self.write_typed_array(pos, T_FLOAT32, v.as_slice(), |h, n, x| h.on_f32(n, x))
            }
            PofValue::Float64Array(v) => {
                self.write_typed_array(pos, T_FLOAT64, v.as_slice(), |h, n, x| h.on_f64(n, x))
            }
            PofValue::Array(items) => {
                h.begin_array(pos, items.len())?;
                self.write_elements(depth, items)?;
                self.handler.end_complex()
            }
            PofValue::Collection(items) => {
                h.begin_collection(pos, items.len())?;
                self.write_elements(depth, items)?;
                self.handler.end_complex()
            }
            PofValue::SparseArray(items) => {
                h.begin_sparse_array(pos, sparse_size(items)?)?;
                self.write_sparse_elements(depth, items)?;
                self.handler.end_complex()
            }
            PofValue::Map(entries) => {
                h.begin_map(pos, entries.len())?;
                self.write_entries(depth, entries)?;
                self.handler.end_complex()
            }
            PofValue::Object(obj) => self.write_user_type(depth, pos, obj),
        }
    }

    fn write_typed_array<T: Copy>(
        &mut self,
        pos: i32,
        type_id: i32,
        items: &[T],
        mut f: impl FnMut(&mut WritingPofHandler<'a>, i32, T) -> Result<()>,
    ) -> Result<()> {
        self.handler.begin_uniform_array(pos, items.len(), type_id)?;
        for (n, &x) in items.iter().enumerate() {
            f(&mut self.handler, n as i32, x)?;
        }
        self.handler.end_complex()
    }

    fn write_elements(&mut self, depth: usize, items: &[PofValue]) -> Result<()> {
        for (n, item) in items.iter().enumerate() {
            self.handler.register_identity(-1)?;
            self.write_value(depth, n as i32, item)?;
        }
        Ok(())
    }

    fn write_sparse_elements(&mut self, depth: usize, items: &BTreeMap<i32, PofValue>) -> Result<()> {
        for (&n, item) in items {
            self.handler.register_identity(-1)?;
            self.write_value(depth, n, item)?;
        }
        Ok(())
    }

    fn write_entries(&mut self, depth: usize, entries: &[(PofValue, PofValue)]) -> Result<()> {
        for (key, value) in entries {
            self.handler.register_identity(-1)?;
            self.write_value(depth, -1, key)?;
            self.handler.register_identity(-1)?;
            self.write_value(depth, -1, value)?;
        }
        Ok(())
    }

    fn write_user_type(&mut self, depth: usize, pos: i32, obj: &PofObject) -> Result<()> {
        let guard = obj.read();
        let value: &dyn PortableObject = &**guard;
        // identities are not tracked inside evolvable objects
        let evolvable = self.is_evolvable(depth) || value.as_evolvable().is_some();

        let mut identity = -1;
        if !evolvable {
            if let Some(refs) = self.references.as_mut() {
                if let Some(id) = refs.identity_of(obj) {
                    return self.handler.on_identity_reference(pos, id);
                }
                identity = refs.register(obj);
            }
        }

        self.check_nesting()?;
        let ctx = self.ctx;
        let type_id = ctx.user_type_id(value)?;
        let serializer = ctx.serializer(type_id)?;
        trace!(type_id, identity, pos, "writing user type");

        self.frames.push(Frame::new(type_id, identity, pos, evolvable));
        let child = self.frames.len();
        let result = serializer.serialize(&mut PofWriter { state: self, depth: child }, value);
        match result {
            Ok(()) => self.close_frame(child),
            Err(e) => {
                self.frames.truncate(child - 1);
                Err(e)
            }
        }
    }
}

/// Size of a sparse array: one past the highest index.
fn sparse_size(items: &BTreeMap<i32, PofValue>) -> Result<usize> {
    if let Some(&first) = items.keys().next() {
        if first < 0 {
            return Err(Error::illegal_argument(format!(
                "cannot encode negative sparse array index {}",
                first
            )));
        }
    }
    Ok(items.keys().next_back().map_or(0, |&last| last as usize + 1))
}

fn reject_nulls(items: &[PofValue]) -> Result<()> {
    if items.iter().any(PofValue::is_null) {
        return Err(Error::illegal_argument("uniform complex values cannot contain null values"));
    }
    Ok(())
}

// ============================================================================
// PofBufferWriter
// ============================================================================

/// Owner of one POF write session.
pub struct PofBufferWriter<'a> {
    state: WriterState<'a>,
}

impl<'a> PofBufferWriter<'a> {
    /// Start a session writing to `out`.
    pub fn new(out: BufferOutput<'a>, ctx: &'a dyn PofContext) -> Self {
        PofBufferWriter {
            state: WriterState {
                handler: WritingPofHandler::new(out),
                ctx,
                references: None,
                frames: Vec::new(),
            },
        }
    }

    /// Top-level handle.
    pub fn writer(&mut self) -> PofWriter<'_, 'a> {
        PofWriter {
            state: &mut self.state,
            depth: 0,
        }
    }

    /// Write a value at the top level.
    pub fn write_object(&mut self, i: i32, value: &PofValue) -> Result<()> {
        self.writer().write_object(i, value)
    }

    /// Track object identities for the rest of the session.
    pub fn enable_reference(&mut self) {
        self.writer().enable_reference()
    }

    /// True if object identities are tracked.
    pub fn is_reference_enabled(&self) -> bool {
        self.state.references.is_some()
    }

    /// Current position of the output cursor.
    pub fn offset(&self) -> usize {
        self.state.handler.offset()
    }
}

// ============================================================================
// PofWriter
// ============================================================================

/// Handle for writing properties at one nesting level.
pub struct PofWriter<'w, 'a> {
    state: &'w mut WriterState<'a>,
    depth: usize,
}

impl<'w, 'a> PofWriter<'w, 'a> {
    /// The session's context.
    pub fn context(&self) -> &'a dyn PofContext {
        self.state.ctx
    }

    /// Type id of the user type being written; -1 at the top level.
    pub fn user_type_id(&self) -> i32 {
        match self.depth {
            0 => -1,
            d => self.state.frames[d - 1].type_id,
        }
    }

    /// Version id of the user type being written.
    pub fn version_id(&self) -> Result<i32> {
        match self.depth {
            0 => Err(Error::illegal_state("not in a user type")),
            d => Ok(self.state.frames[d - 1].version_id),
        }
    }

    /// Set the version id written in the header.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` at the top level and `IllegalArgument` for a
    /// negative version.
    pub fn set_version_id(&mut self, version: i32) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::illegal_state("not in a user type"));
        }
        if version < 0 {
            return Err(Error::illegal_argument(format!(
                "negative version identifier: {}",
                version
            )));
        }
        self.state.close_above(self.depth)?;
        self.state.frame(self.depth).version_id = version;
        Ok(())
    }

    /// True if this user type or any enclosing one is evolvable.
    pub fn is_evolvable(&self) -> bool {
        self.state.is_evolvable(self.depth)
    }

    /// Track object identities for the whole session.
    pub fn enable_reference(&mut self) {
        self.state.references.get_or_insert_with(ReferenceLibrary::new);
    }

    /// True if object identities are tracked.
    pub fn is_reference_enabled(&self) -> bool {
        self.state.references.is_some()
    }

    fn property(
        &mut self,
        i: i32,
        identity: bool,
        f: impl FnOnce(&mut WriterState<'a>, usize, i32) -> Result<()>,
    ) -> Result<()> {
        self.state.begin_property(self.depth, i)?;
        if identity {
            self.state.handler.register_identity(-1)?;
        }
        f(self.state, self.depth, i)?;
        self.state.end_property(self.depth, i);
        Ok(())
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Write a boolean property.
    pub fn write_bool(&mut self, i: i32, v: bool) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_bool(i, v))
    }

    /// Write an octet property.
    pub fn write_u8(&mut self, i: i32, v: u8) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_octet(i, v))
    }

    /// Write a 16-bit character property.
    pub fn write_char16(&mut self, i: i32, v: u16) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_char(i, v))
    }

    /// Write a 16-bit integer property.
    pub fn write_i16(&mut self, i: i32, v: i16) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_integer(i, v as i64, T_INT16))
    }

    /// Write a 32-bit integer property.
    pub fn write_i32(&mut self, i: i32, v: i32) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_integer(i, v as i64, T_INT32))
    }

    /// Write a 64-bit integer property.
    pub fn write_i64(&mut self, i: i32, v: i64) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_integer(i, v, T_INT64))
    }

    /// Write a 32-bit float property.
    pub fn write_f32(&mut self, i: i32, v: f32) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_f32(i, v))
    }

    /// Write a 64-bit float property.
    pub fn write_f64(&mut self, i: i32, v: f64) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_f64(i, v))
    }

    /// Write a null property; omitted entirely inside a user type.
    pub fn write_null(&mut self, i: i32) -> Result<()> {
        self.property(i, false, |s, _, i| s.handler.on_null_reference(i))
    }

    /// Write a string property.
    pub fn write_string(&mut self, i: i32, v: &str) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_char_string(i, v))
    }

    /// Write an octet-string property.
    pub fn write_binary(&mut self, i: i32, v: &Binary) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_octet_string(i, v.as_slice()))
    }

    // ========================================================================
    // Date and time
    // ========================================================================

    /// Write a date property.
    pub fn write_date(&mut self, i: i32, v: &RawDate) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_date(i, v))
    }

    /// Write a time property.
    pub fn write_time(&mut self, i: i32, v: &RawTime) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_time(i, v))
    }

    /// Write a date-time property.
    pub fn write_date_time(&mut self, i: i32, v: &RawDateTime) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_date_time(i, v))
    }

    /// Write a year-month interval property.
    pub fn write_year_month_interval(&mut self, i: i32, v: &RawYearMonthInterval) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_year_month_interval(i, v))
    }

    /// Write a time interval property.
    pub fn write_time_interval(&mut self, i: i32, v: &RawTimeInterval) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_time_interval(i, v))
    }

    /// Write a day-time interval property.
    pub fn write_day_time_interval(&mut self, i: i32, v: &RawDayTimeInterval) -> Result<()> {
        self.property(i, true, |s, _, i| s.handler.on_day_time_interval(i, v))
    }

    // ========================================================================
    // Uniform arrays
    // ========================================================================

    /// Write a boolean array property.
    pub fn write_bool_array(&mut self, i: i32, v: &[bool]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_BOOLEAN, v, |h, n, x| h.on_bool(n, x))
        })
    }

    /// Write an octet array property.
    pub fn write_octet_array(&mut self, i: i32, v: &[u8]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_OCTET, v, |h, n, x| h.on_octet(n, x))
        })
    }

    /// Write a character array property.
    pub fn write_char16_array(&mut self, i: i32, v: &[u16]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_CHAR, v, |h, n, x| h.on_char(n, x))
        })
    }

    /// Write a 16-bit integer array property.
    pub fn write_i16_array(&mut self, i: i32, v: &[i16]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_INT16, v, |h, n, x| h.on_integer(n, x as i64, T_INT16))
        })
    }

    /// Write a 32-bit integer array property.
    pub fn write_i32_array(&mut self, i: i32, v: &[i32]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_INT32, v, |h, n, x| h.on_integer(n, x as i64, T_INT32))
        })
    }

    /// Write a 64-bit integer array property.
    pub fn write_i64_array(&mut self, i: i32, v: &[i64]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_INT64, v, |h, n, x| h.on_integer(n, x, T_INT64))
        })
    }

    /// Write a 32-bit float array property.
    pub fn write_f32_array(&mut self, i: i32, v: &[f32]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_FLOAT32, v, |h, n, x| h.on_f32(n, x))
        })
    }

    /// Write a 64-bit float array property.
    pub fn write_f64_array(&mut self, i: i32, v: &[f64]) -> Result<()> {
        self.property(i, true, |s, _, i| {
            s.write_typed_array(i, T_FLOAT64, v, |h, n, x| h.on_f64(n, x))
        })
    }

    // ========================================================================
    // Complex values
    // ========================================================================

    /// Write an array of values of any type.
    pub fn write_array(&mut self, i: i32, items: &[PofValue]) -> Result<()> {
        self.property(i, true, |s, depth, i| {
            s.handler.begin_array(i, items.len())?;
            s.write_elements(depth, items)?;
            s.handler.end_complex()
        })
    }

    /// Write an array whose elements all have `type_id`.
    pub fn write_uniform_array(&mut self, i: i32, type_id: i32, items: &[PofValue]) -> Result<()> {
        reject_nulls(items)?;
        self.property(i, true, |s, depth, i| {
            s.handler.begin_uniform_array(i, items.len(), type_id)?;
            s.write_elements(depth, items)?;
            s.handler.end_complex()
        })
    }

    /// Write a collection of values of any type.
    pub fn write_collection(&mut self, i: i32, items: &[PofValue]) -> Result<()> {
        self.property(i, true, |s, depth, i| {
            s.handler.begin_collection(i, items.len())?;
            s.write_elements(depth, items)?;
            s.handler.end_complex()
        })
    }

    /// Write a collection whose elements all have `type_id`.
    pub fn write_uniform_collection(
        &mut self,
        i: i32,
        type_id: i32,
        items: &[PofValue],
    ) -> Result<()> {
        reject_nulls(items)?;
        self.property(i, true, |s, depth, i| {
            s.handler.begin_uniform_collection(i, items.len(), type_id)?;
            s.write_elements(depth, items)?;
            s.handler.end_complex()
        })
    }

    /// Write a sparse array; default-valued entries are omitted.
    pub fn write_sparse_array(&mut self, i: i32, items: &BTreeMap<i32, PofValue>) -> Result<()> {
        let size = sparse_size(items)?;
        self.property(i, true, |s, depth, i| {
            s.handler.begin_sparse_array(i, size)?;
            s.write_sparse_elements(depth, items)?;
            s.handler.end_complex()
        })
    }

    /// Write a sparse array whose entries all have `type_id`.
    pub fn write_uniform_sparse_array(
        &mut self,
        i: i32,
        type_id: i32,
        items: &BTreeMap<i32, PofValue>,
    ) -> Result<()> {
        let size = sparse_size(items)?;
        if items.values().any(PofValue::is_null) {
            return Err(Error::illegal_argument(
                "uniform complex values cannot contain null values",
            ));
        }
        self.property(i, true, |s, depth, i| {
            s.handler.begin_uniform_sparse_array(i, size, type_id)?;
            s.write_sparse_elements(depth, items)?;
            s.handler.end_complex()
        })
    }

    /// Write a map of values of any type.
    pub fn write_map(&mut self, i: i32, entries: &[(PofValue, PofValue)]) -> Result<()> {
        self.property(i, true, |s, depth, i| {
            s.handler.begin_map(i, entries.len())?;
            s.write_entries(depth, entries)?;
            s.handler.end_complex()
        })
    }

    /// Write a map whose keys all have `key_type`.
    pub fn write_uniform_keys_map(
        &mut self,
        i: i32,
        key_type: i32,
        entries: &[(PofValue, PofValue)],
    ) -> Result<()> {
        if entries.iter().any(|(k, _)| k.is_null()) {
            return Err(Error::illegal_argument("uniform map keys cannot be null"));
        }
        self.property(i, true, |s, depth, i| {
            s.handler.begin_uniform_keys_map(i, entries.len(), key_type)?;
            s.write_entries(depth, entries)?;
            s.handler.end_complex()
        })
    }

    /// Write a map whose keys and values each share one type.
    pub fn write_uniform_map(
        &mut self,
        i: i32,
        key_type: i32,
        value_type: i32,
        entries: &[(PofValue, PofValue)],
    ) -> Result<()> {
        if entries.iter().any(|(k, v)| k.is_null() || v.is_null()) {
            return Err(Error::illegal_argument("uniform map entries cannot be null"));
        }
        self.property(i, true, |s, depth, i| {
            s.handler.begin_uniform_map(i, entries.len(), key_type, value_type)?;
            s.write_entries(depth, entries)?;
            s.handler.end_complex()
        })
    }

    /// Write a user-type property.
    pub fn write_user_type(&mut self, i: i32, obj: &PofObject) -> Result<()> {
        self.property(i, true, |s, depth, i| s.write_user_type(depth, i, obj))
    }

    /// Write a value of any type.
    pub fn write_object(&mut self, i: i32, value: &PofValue) -> Result<()> {
        self.property(i, true, |s, depth, i| s.write_value(depth, i, value))
    }

    // ========================================================================
    // Nesting and termination
    // ========================================================================

    /// Open a writer for a nested user type of the same type as this one.
    pub fn create_nested_writer(&mut self, i: i32) -> Result<PofWriter<'_, 'a>> {
        let type_id = self.user_type_id();
        self.create_nested_writer_typed(i, type_id)
    }

    /// Open a writer for a nested user type of `type_id`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` at the top level, plus any error from
    /// beginning property `i`.
    pub fn create_nested_writer_typed(&mut self, i: i32, type_id: i32) -> Result<PofWriter<'_, 'a>> {
        self.state.open_nested(self.depth, i, type_id)?;
        Ok(PofWriter {
            state: &mut *self.state,
            depth: self.depth + 1,
        })
    }

    /// Append pre-encoded properties and terminate the user type. No
    /// further writes are accepted afterwards.
    pub fn write_remainder(&mut self, data: Option<&Binary>) -> Result<()> {
        self.state.write_remainder(self.depth, data)
    }
}
