//! POF reader sessions.
//!
//! A [`PofBufferReader`] owns one read session: the input cursor, the
//! context, the identities seen so far and a stack of user-type frames.
//! Reading happens through [`PofReader`] handles bound to one frame.
//!
//! Inside a user type, properties must be requested in ascending index
//! order. Requesting an index the stream does not contain skips over any
//! lower properties and yields the type's default (zero, `false`, `None`).
//!
//! ## Frame cursor
//!
//! Each frame remembers the index of the next property in the stream and
//! the offset where that index was read:
//!
//! ```text
//! version | idx value | idx value | ... | -1
//!           ^ next_prop_offset, next_prop = idx
//! ```
//!
//! Once the terminator is read, `next_prop` is [`EOPS`].

use crate::constants::*;
use crate::context::PofContext;
use crate::raw::{RawDate, RawDateTime, RawDayTimeInterval, RawTime, RawTimeInterval, RawYearMonthInterval};
use crate::skip::{read_size, read_uniform_type, skip_value};
use crate::value::{PofObject, PofValue};
use crate::writer::MAX_NESTING;
use gridwire_core::{Binary, Error, Result};
use gridwire_io::BufferInput;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// "End of property stream": sorts after every real property index.
pub const EOPS: i32 = i32::MAX;

#[derive(Debug)]
struct Frame {
    type_id: i32,
    version_id: i32,
    next_prop: i32,
    next_prop_offset: usize,
    prev_prop: i32,
    nested_prop: Option<i32>,
    pending_identity: Option<i32>,
    ended: bool,
}

impl Frame {
    fn new(type_id: i32, version_id: i32, pending_identity: Option<i32>) -> Self {
        Frame {
            type_id,
            version_id,
            next_prop: EOPS,
            next_prop_offset: 0,
            prev_prop: -1,
            nested_prop: None,
            pending_identity,
            ended: false,
        }
    }
}

/// Session state shared by every handle of one reader.
pub(crate) struct ReaderState<'a> {
    input: BufferInput,
    ctx: &'a dyn PofContext,
    identities: HashMap<i32, PofValue>,
    frames: Vec<Frame>,
    /// Complex values currently open, across all frames.
    open_complexes: usize,
}

impl<'a> ReaderState<'a> {
    fn frame(&mut self, depth: usize) -> &mut Frame {
        &mut self.frames[depth - 1]
    }

    fn terminated(&self) -> Error {
        Error::eof(self.input.offset(), "user type POF stream terminated")
    }

    /// User types and complex values share one nesting budget.
    fn check_nesting(&self) -> Result<()> {
        if self.frames.len() + self.open_complexes >= MAX_NESTING {
            return Err(Error::format(
                self.input.offset(),
                format!("values nested deeper than {}", MAX_NESTING),
            ));
        }
        Ok(())
    }

    /// Read the next property index into the frame at `depth`.
    fn prime(&mut self, depth: usize) -> Result<()> {
        let offset = self.input.offset();
        let n = self.input.read_i32()?;
        let f = self.frame(depth);
        f.next_prop_offset = offset;
        f.next_prop = if n < 0 { EOPS } else { n };
        Ok(())
    }

    /// Position the cursor at property `i`; false if the stream has no
    /// such property.
    fn advance_to(&mut self, depth: usize, i: i32) -> Result<bool> {
        if depth == 0 {
            if i > 0 {
                return Err(Error::illegal_state("not in a user type"));
            }
            return Ok(true);
        }
        self.close_above(depth)?;
        if self.frame(depth).ended {
            return Err(self.terminated());
        }
        if i < 0 {
            return Err(Error::illegal_argument(format!("negative property index: {}", i)));
        }
        let f = self.frame(depth);
        if i <= f.prev_prop {
            return Err(Error::illegal_state(format!(
                "previous property index={}, requested property index={} while reading user type {}",
                f.prev_prop, i, f.type_id
            )));
        }
        while self.frame(depth).next_prop < i {
            skip_value(&mut self.input)?;
            self.prime(depth)?;
        }
        Ok(self.frame(depth).next_prop == i)
    }

    /// Finish property `i`, priming the next index if `i` was read.
    fn complete(&mut self, depth: usize, i: i32) -> Result<()> {
        if depth == 0 {
            return Ok(());
        }
        if self.frame(depth).next_prop == i {
            self.prime(depth)?;
        }
        self.frame(depth).prev_prop = i;
        Ok(())
    }

    fn close_above(&mut self, depth: usize) -> Result<()> {
        while self.frames.len() > depth {
            let child = self.frames.len();
            self.close_frame(child)?;
            if child > 1 {
                if let Some(prop) = self.frame(child - 1).nested_prop.take() {
                    self.complete(child - 1, prop)?;
                }
            }
        }
        Ok(())
    }

    /// Discard whatever the frame at `depth` has not read, then pop it.
    fn close_frame(&mut self, depth: usize) -> Result<()> {
        self.close_above(depth)?;
        let f = self.frame(depth);
        if !f.ended && f.next_prop != EOPS {
            loop {
                skip_value(&mut self.input)?;
                if self.input.read_i32()? < 0 {
                    break;
                }
            }
        }
        self.frames.truncate(depth - 1);
        Ok(())
    }

    fn read_remainder(&mut self, depth: usize) -> Result<Option<Binary>> {
        if depth == 0 {
            return Err(Error::illegal_state("not in a user type"));
        }
        self.close_above(depth)?;
        let f = self.frame(depth);
        if f.ended {
            return Err(self.terminated());
        }
        f.ended = true;
        if f.next_prop == EOPS {
            return Ok(None);
        }
        let begin = f.next_prop_offset;
        let mut end;
        loop {
            skip_value(&mut self.input)?;
            end = self.input.offset();
            if self.input.read_i32()? < 0 {
                break;
            }
        }
        self.frame(depth).next_prop = EOPS;
        self.input.buffer().slice(begin, end - begin).map(Some)
    }

    fn open_nested(&mut self, depth: usize, i: i32) -> Result<()> {
        if depth == 0 {
            return Err(Error::illegal_state("not in a user type"));
        }
        self.check_nesting()?;
        if self.advance_to(depth, i)? {
            let offset = self.input.offset();
            let type_id = self.input.read_i32()?;
            let version = self.input.read_i32()?;
            if type_id < 0 || version < 0 {
                return Err(Error::format(
                    offset,
                    format!("property {} is not a user type: type={}, version={}", i, type_id, version),
                ));
            }
            self.frames.push(Frame::new(type_id, version, None));
            self.prime(depth + 1)?;
        } else {
            self.complete(depth, i)?;
            let type_id = self.frame(depth).type_id;
            let mut fake = Frame::new(type_id, 0, None);
            fake.next_prop_offset = self.input.offset();
            self.frames.push(fake);
        }
        self.frame(depth).nested_prop = Some(i);
        Ok(())
    }

    // ========================================================================
    // Identities
    // ========================================================================

    fn register(&mut self, id: i32, value: PofValue, offset: usize) -> Result<()> {
        match self.identities.get(&id) {
            Some(existing) if existing.same_identity(&value) => Ok(()),
            Some(_) => Err(Error::format(offset, format!("duplicate identity: {}", id))),
            None => {
                self.identities.insert(id, value);
                Ok(())
            }
        }
    }

    fn lookup(&self, id: i32, offset: usize) -> Result<PofValue> {
        self.identities
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::format(offset, format!("missing identity: {}", id)))
    }

    // ========================================================================
    // Values
    // ========================================================================

    fn read_value(&mut self) -> Result<PofValue> {
        let offset = self.input.offset();
        match self.input.read_i32()? {
            T_IDENTITY => {
                let id = self.input.read_i32()?;
                let type_id = self.input.read_i32()?;
                if is_user_type(type_id) {
                    return self.read_user_type(type_id, Some(id));
                }
                let value = self.read_body(type_id, offset)?;
                self.register(id, value.clone(), offset)?;
                Ok(value)
            }
            T_REFERENCE => {
                let id = self.input.read_i32()?;
                self.lookup(id, offset)
            }
            type_id => self.read_body(type_id, offset),
        }
    }

    /// Read a value whose type id has already been consumed.
    fn read_body(&mut self, type_id: i32, offset: usize) -> Result<PofValue> {
        if !is_complex(type_id) {
            return self.decode_body(type_id, offset);
        }
        self.check_nesting()?;
        self.open_complexes += 1;
        let result = self.decode_body(type_id, offset);
        self.open_complexes -= 1;
        result
    }

    fn decode_body(&mut self, type_id: i32, offset: usize) -> Result<PofValue> {
        let input = &mut self.input;
        let value = match type_id {
            T_INT16 => PofValue::Int16(input.read_i16()?),
            T_INT32 => PofValue::Int32(input.read_i32()?),
            T_INT64 => PofValue::Int64(input.read_i64()?),
            T_FLOAT32 => PofValue::Float32(input.read_f32()?),
            T_FLOAT64 => PofValue::Float64(input.read_f64()?),
            T_INT128 | T_FLOAT128 | T_DECIMAL32 | T_DECIMAL64 | T_DECIMAL128 => {
                return Err(Error::format(
                    offset,
                    format!("unable to convert type {} to a numeric type", type_id),
                ))
            }
            T_BOOLEAN => PofValue::Bool(input.read_i32()? != 0),
            T_OCTET => PofValue::Octet(input.read_u8()?),
            T_CHAR => PofValue::Char(input.read_char16()?),
            T_OCTET_STRING => match input.read_i32()? {
                V_REFERENCE_NULL => PofValue::Null,
                n if n < 0 => {
                    return Err(Error::format(offset, format!("negative size: {}", n)))
                }
                n => PofValue::Binary(input.read_binary(n as usize)?),
            },
            T_CHAR_STRING => input.read_string()?.map_or(PofValue::Null, PofValue::String),
            T_DATE => PofValue::Date(RawDate::read_from(input)?),
            T_YEAR_MONTH_INTERVAL => PofValue::YearMonthInterval(RawYearMonthInterval::read_from(input)?),
            T_TIME => PofValue::Time(RawTime::read_from(input)?),
            T_TIME_INTERVAL => PofValue::TimeInterval(RawTimeInterval::read_from(input)?),
            T_DATETIME => PofValue::DateTime(RawDateTime::read_from(input)?),
            T_DAY_TIME_INTERVAL => PofValue::DayTimeInterval(RawDayTimeInterval::read_from(input)?),
            T_COLLECTION | T_ARRAY => {
                let n = read_size(input)?;
                let mut items = Vec::with_capacity(n.min(1024));
                for _ in 0..n {
                    items.push(self.read_value()?);
                }
                if type_id == T_ARRAY {
                    PofValue::Array(items)
                } else {
                    PofValue::Collection(items)
                }
            }
            T_UNIFORM_ARRAY => {
                let elem = read_uniform_type(input)?;
                let n = read_size(input)?;
                self.read_uniform_array(elem, n, offset)?
            }
            T_UNIFORM_COLLECTION => {
                let elem = read_uniform_type(input)?;
                let n = read_size(input)?;
                let mut items = Vec::with_capacity(n.min(1024));
                for _ in 0..n {
                    items.push(self.read_body(elem, offset)?);
                }
                PofValue::Collection(items)
            }
            T_SPARSE_ARRAY => self.read_sparse(None, offset)?,
            T_UNIFORM_SPARSE_ARRAY => {
                let elem = read_uniform_type(input)?;
                self.read_sparse(Some(elem), offset)?
            }
            T_MAP => self.read_map(None, None, offset)?,
            T_UNIFORM_KEYS_MAP => {
                let keys = read_uniform_type(input)?;
                self.read_map(Some(keys), None, offset)?
            }
            T_UNIFORM_MAP => {
                let keys = read_uniform_type(input)?;
                let values = read_uniform_type(input)?;
                self.read_map(Some(keys), Some(values), offset)?
            }
            V_BOOLEAN_FALSE => PofValue::Bool(false),
            V_BOOLEAN_TRUE => PofValue::Bool(true),
            V_STRING_ZERO_LENGTH => PofValue::String(String::new()),
            V_COLLECTION_EMPTY => PofValue::Array(Vec::new()),
            V_REFERENCE_NULL => PofValue::Null,
            V_FP_POS_INFINITY => PofValue::Float64(f64::INFINITY),
            V_FP_NEG_INFINITY => PofValue::Float64(f64::NEG_INFINITY),
            V_FP_NAN => PofValue::Float64(f64::NAN),
            V_INT_22..=V_INT_NEG_1 => PofValue::Int32(decode_tiny_int(type_id)),
            t if is_user_type(t) => self.read_user_type(t, None)?,
            t => return Err(Error::format(offset, format!("illegal type id: {}", t))),
        };
        Ok(value)
    }

    fn read_uniform_array(&mut self, elem: i32, n: usize, offset: usize) -> Result<PofValue> {
        fn read_n<T>(n: usize, mut f: impl FnMut() -> Result<T>) -> Result<Vec<T>> {
            let mut v = Vec::with_capacity(n.min(4096));
            for _ in 0..n {
                v.push(f()?);
            }
            Ok(v)
        }

        let input = &mut self.input;
        Ok(match elem {
            T_OCTET => PofValue::Binary(input.read_binary(n)?),
            T_BOOLEAN => PofValue::BoolArray(read_n(n, || Ok(input.read_i32()? != 0))?),
            T_CHAR => PofValue::Char16Array(read_n(n, || input.read_char16())?),
            T_INT16 => PofValue::Int16Array(read_n(n, || input.read_i16())?),
            T_INT32 => PofValue::Int32Array(read_n(n, || input.read_i32())?),
            T_INT64 => PofValue::Int64Array(read_n(n, || input.read_i64())?),
            T_FLOAT32 => PofValue::Float32Array(read_n(n, || input.read_f32())?),
            T_FLOAT64 => PofValue::Float64Array(read_n(n, || input.read_f64())?),
            _ => PofValue::Array(read_n(n, || self.read_body(elem, offset))?),
        })
    }

    fn read_sparse(&mut self, elem: Option<i32>, offset: usize) -> Result<PofValue> {
        let count = read_size(&mut self.input)?;
        let mut items = BTreeMap::new();
        for _ in 0..=count {
            let idx_offset = self.input.offset();
            let idx = self.input.read_i32()?;
            if idx < 0 {
                break;
            }
            if idx as usize >= count {
                return Err(Error::format(
                    idx_offset,
                    format!("sparse array index {} out of range for size {}", idx, count),
                ));
            }
            let value = match elem {
                Some(t) => self.read_body(t, offset)?,
                None => self.read_value()?,
            };
            items.insert(idx, value);
        }
        Ok(PofValue::SparseArray(items))
    }

    fn read_map(
        &mut self,
        keys: Option<i32>,
        values: Option<i32>,
        offset: usize,
    ) -> Result<PofValue> {
        let n = read_size(&mut self.input)?;
        let mut entries = Vec::with_capacity(n.min(1024));
        for _ in 0..n {
            let key = match keys {
                Some(t) => self.read_body(t, offset)?,
                None => self.read_value()?,
            };
            let value = match values {
                Some(t) => self.read_body(t, offset)?,
                None => self.read_value()?,
            };
            entries.push((key, value));
        }
        Ok(PofValue::Map(entries))
    }

    fn read_user_type(&mut self, type_id: i32, identity: Option<i32>) -> Result<PofValue> {
        let offset = self.input.offset();
        let version = self.input.read_i32()?;
        if version < 0 {
            return Err(Error::format(
                offset,
                format!("negative version identifier {} for user type {}", version, type_id),
            ));
        }
        self.check_nesting()?;
        let ctx = self.ctx;
        let serializer = ctx.serializer(type_id)?;
        trace!(type_id, version, ?identity, "reading user type");

        self.frames.push(Frame::new(type_id, version, identity));
        let child = self.frames.len();
        let result = self
            .prime(child)
            .and_then(|()| serializer.deserialize(&mut PofReader { state: self, depth: child }));
        let obj = match result {
            Ok(obj) => obj,
            Err(e) => {
                self.frames.truncate(child - 1);
                return Err(e);
            }
        };
        self.close_frame(child)?;
        let value = PofValue::Object(obj);
        if let Some(id) = identity {
            self.register(id, value.clone(), offset)?;
        }
        Ok(value)
    }
}

// ============================================================================
// Coercions
// ============================================================================

fn describe(v: &PofValue) -> &'static str {
    match v {
        PofValue::Null => "null",
        PofValue::Bool(_) => "boolean",
        PofValue::Octet(_) => "octet",
        PofValue::Char(_) => "char",
        PofValue::Int16(_) => "int16",
        PofValue::Int32(_) => "int32",
        PofValue::Int64(_) => "int64",
        PofValue::Float32(_) => "float32",
        PofValue::Float64(_) => "float64",
        PofValue::Binary(_) => "octet-string",
        PofValue::String(_) => "char-string",
        PofValue::Date(_) => "date",
        PofValue::Time(_) => "time",
        PofValue::DateTime(_) => "datetime",
        PofValue::YearMonthInterval(_) => "year-month-interval",
        PofValue::TimeInterval(_) => "time-interval",
        PofValue::DayTimeInterval(_) => "day-time-interval",
        PofValue::BoolArray(_) => "boolean[]",
        PofValue::Char16Array(_) => "char[]",
        PofValue::Int16Array(_) => "int16[]",
        PofValue::Int32Array(_) => "int32[]",
        PofValue::Int64Array(_) => "int64[]",
        PofValue::Float32Array(_) => "float32[]",
        PofValue::Float64Array(_) => "float64[]",
        PofValue::Array(_) => "array",
        PofValue::Collection(_) => "collection",
        PofValue::SparseArray(_) => "sparse-array",
        PofValue::Map(_) => "map",
        PofValue::Object(_) => "user type",
    }
}

fn mismatch(offset: usize, v: &PofValue, target: &str) -> Error {
    Error::format(offset, format!("unable to convert {} to {}", describe(v), target))
}

fn to_i64(v: &PofValue) -> Option<i64> {
    Some(match v {
        PofValue::Null => 0,
        PofValue::Bool(b) => *b as i64,
        PofValue::Octet(b) => *b as i64,
        PofValue::Char(c) => *c as i64,
        PofValue::Int16(n) => *n as i64,
        PofValue::Int32(n) => *n as i64,
        PofValue::Int64(n) => *n,
        PofValue::Float32(f) => *f as i64,
        PofValue::Float64(f) => *f as i64,
        _ => return None,
    })
}

fn to_f64(v: &PofValue) -> Option<f64> {
    Some(match v {
        PofValue::Float32(f) => *f as f64,
        PofValue::Float64(f) => *f,
        other => to_i64(other)? as f64,
    })
}

fn is_complex(type_id: i32) -> bool {
    matches!(
        type_id,
        T_COLLECTION
            | T_UNIFORM_COLLECTION
            | T_ARRAY
            | T_UNIFORM_ARRAY
            | T_SPARSE_ARRAY
            | T_UNIFORM_SPARSE_ARRAY
            | T_MAP
            | T_UNIFORM_KEYS_MAP
            | T_UNIFORM_MAP
    )
}

/// Elements of any array-like value.
fn elements(v: PofValue, offset: usize, target: &str) -> Result<Vec<PofValue>> {
    fn map<T>(v: Vec<T>, f: impl Fn(T) -> PofValue) -> Vec<PofValue> {
        v.into_iter().map(f).collect()
    }
    Ok(match v {
        PofValue::Array(v) | PofValue::Collection(v) => v,
        PofValue::BoolArray(v) => map(v, PofValue::Bool),
        PofValue::Char16Array(v) => map(v, PofValue::Char),
        PofValue::Int16Array(v) => map(v, PofValue::Int16),
        PofValue::Int32Array(v) => map(v, PofValue::Int32),
        PofValue::Int64Array(v) => map(v, PofValue::Int64),
        PofValue::Float32Array(v) => map(v, PofValue::Float32),
        PofValue::Float64Array(v) => map(v, PofValue::Float64),
        PofValue::Binary(b) => b.as_slice().iter().map(|&x| PofValue::Octet(x)).collect(),
        PofValue::SparseArray(m) => densify(m)?,
        other => return Err(mismatch(offset, &other, target)),
    })
}

/// Expand a sparse array into a dense one, nulls filling the gaps.
///
/// # Errors
///
/// Returns `OutOfMemory` if the dense array cannot be allocated.
fn densify(m: BTreeMap<i32, PofValue>) -> Result<Vec<PofValue>> {
    let size = m.keys().next_back().map_or(0, |&k| k as usize + 1);
    let mut v = Vec::new();
    v.try_reserve_exact(size).map_err(|_| Error::OutOfMemory)?;
    v.resize(size, PofValue::Null);
    for (k, x) in m {
        v[k as usize] = x;
    }
    Ok(v)
}

fn is_empty_collection(v: &PofValue) -> bool {
    matches!(v, PofValue::Array(x) | PofValue::Collection(x) if x.is_empty())
}

type Exact<T> = fn(PofValue) -> std::result::Result<Vec<T>, PofValue>;

// ============================================================================
// PofBufferReader
// ============================================================================

/// Owner of one POF read session.
pub struct PofBufferReader<'a> {
    state: ReaderState<'a>,
}

impl<'a> PofBufferReader<'a> {
    /// Start a session reading from `input`.
    pub fn new(input: BufferInput, ctx: &'a dyn PofContext) -> Self {
        PofBufferReader {
            state: ReaderState {
                input,
                ctx,
                identities: HashMap::new(),
                frames: Vec::new(),
                open_complexes: 0,
            },
        }
    }

    /// Top-level handle.
    pub fn reader(&mut self) -> PofReader<'_, 'a> {
        PofReader {
            state: &mut self.state,
            depth: 0,
        }
    }

    /// Read the next top-level value.
    pub fn read_object(&mut self, i: i32) -> Result<PofValue> {
        self.reader().read_object(i)
    }

    /// Current position of the input cursor.
    pub fn offset(&self) -> usize {
        self.state.input.offset()
    }
}

// ============================================================================
// PofReader
// ============================================================================

/// Handle for reading properties at one nesting level.
pub struct PofReader<'r, 'a> {
    state: &'r mut ReaderState<'a>,
    depth: usize,
}

impl<'r, 'a> PofReader<'r, 'a> {
    /// The session's context.
    pub fn context(&self) -> &'a dyn PofContext {
        self.state.ctx
    }

    /// Type id of the user type being read; -1 at the top level.
    pub fn user_type_id(&self) -> i32 {
        match self.depth {
            0 => -1,
            d => self.state.frames[d - 1].type_id,
        }
    }

    /// Version id found in the user type's header.
    pub fn version_id(&self) -> Result<i32> {
        match self.depth {
            0 => Err(Error::illegal_state("not in a user type")),
            d => Ok(self.state.frames[d - 1].version_id),
        }
    }

    /// Index of the next property in the stream, or -1 at the end.
    pub fn next_property_index(&mut self) -> Result<i32> {
        if self.depth == 0 {
            return Err(Error::illegal_state("not in a user type"));
        }
        self.state.close_above(self.depth)?;
        let f = self.state.frame(self.depth);
        Ok(if f.ended || f.next_prop == EOPS { -1 } else { f.next_prop })
    }

    /// Bind the user type being read to its stream identity, so that
    /// references to it inside its own properties resolve. Deserializers
    /// call this before reading any property.
    pub fn register_identity(&mut self, obj: &PofObject) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::illegal_state("not in a user type"));
        }
        let offset = self.state.input.offset();
        if let Some(id) = self.state.frame(self.depth).pending_identity.take() {
            self.state.register(id, PofValue::Object(obj.clone()), offset)?;
        }
        Ok(())
    }

    /// Open a reader over the nested user type at property `i`. If the
    /// property is absent the nested reader sees no properties.
    pub fn create_nested_reader(&mut self, i: i32) -> Result<PofReader<'_, 'a>> {
        self.state.open_nested(self.depth, i)?;
        Ok(PofReader {
            state: &mut *self.state,
            depth: self.depth + 1,
        })
    }

    /// Consume all unread properties and return their encoded bytes, or
    /// `None` if there are none. No further reads are accepted afterwards.
    pub fn read_remainder(&mut self) -> Result<Option<Binary>> {
        self.state.read_remainder(self.depth)
    }

    fn read_property(&mut self, i: i32) -> Result<Option<(usize, PofValue)>> {
        let depth = self.depth;
        let found = if self.state.advance_to(depth, i)? {
            let offset = self.state.input.offset();
            Some((offset, self.state.read_value()?))
        } else {
            None
        };
        self.state.complete(depth, i)?;
        Ok(found)
    }

    fn read_numeric(&mut self, i: i32, target: &str) -> Result<i64> {
        match self.read_property(i)? {
            None => Ok(0),
            Some((offset, v)) => to_i64(&v).ok_or_else(|| mismatch(offset, &v, target)),
        }
    }

    fn read_float(&mut self, i: i32, target: &str) -> Result<f64> {
        match self.read_property(i)? {
            None => Ok(0.0),
            Some((offset, v)) => to_f64(&v).ok_or_else(|| mismatch(offset, &v, target)),
        }
    }

    /// Read property `i` and convert it with `f`; absent and null are `None`.
    fn read_with<T>(
        &mut self,
        i: i32,
        target: &str,
        f: impl FnOnce(PofValue) -> std::result::Result<T, PofValue>,
    ) -> Result<Option<T>> {
        match self.read_property(i)? {
            None | Some((_, PofValue::Null)) => Ok(None),
            Some((offset, v)) => f(v).map(Some).map_err(|v| mismatch(offset, &v, target)),
        }
    }

    fn read_array_of<T>(
        &mut self,
        i: i32,
        target: &str,
        exact: Exact<T>,
        conv: fn(&PofValue) -> Option<T>,
    ) -> Result<Option<Vec<T>>> {
        let (offset, v) = match self.read_property(i)? {
            None | Some((_, PofValue::Null)) => return Ok(None),
            Some(p) => p,
        };
        let v = match exact(v) {
            Ok(items) => return Ok(Some(items)),
            Err(v) => v,
        };
        let items = elements(v, offset, target)?;
        items
            .iter()
            .map(|x| conv(x).ok_or_else(|| mismatch(offset, x, target)))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Read a boolean property.
    pub fn read_bool(&mut self, i: i32) -> Result<bool> {
        Ok(self.read_numeric(i, "boolean")? != 0)
    }

    /// Read an octet property.
    pub fn read_u8(&mut self, i: i32) -> Result<u8> {
        Ok(self.read_numeric(i, "octet")? as u8)
    }

    /// Read a 16-bit character property.
    pub fn read_char16(&mut self, i: i32) -> Result<u16> {
        Ok(self.read_numeric(i, "char")? as u16)
    }

    /// Read a 16-bit integer property.
    pub fn read_i16(&mut self, i: i32) -> Result<i16> {
        Ok(self.read_numeric(i, "int16")? as i16)
    }

    /// Read a 32-bit integer property.
    pub fn read_i32(&mut self, i: i32) -> Result<i32> {
        Ok(self.read_numeric(i, "int32")? as i32)
    }

    /// Read a 64-bit integer property.
    pub fn read_i64(&mut self, i: i32) -> Result<i64> {
        self.read_numeric(i, "int64")
    }

    /// Read a 32-bit float property.
    pub fn read_f32(&mut self, i: i32) -> Result<f32> {
        match self.read_property(i)? {
            None => Ok(0.0),
            Some((_, PofValue::Float32(f))) => Ok(f),
            Some((offset, v)) => to_f64(&v)
                .map(|f| f as f32)
                .ok_or_else(|| mismatch(offset, &v, "float32")),
        }
    }

    /// Read a 64-bit float property.
    pub fn read_f64(&mut self, i: i32) -> Result<f64> {
        self.read_float(i, "float64")
    }

    /// Read a string property.
    ///
    /// # Errors
    ///
    /// Returns `UtfDataFormat` if an octet string is not valid UTF-8, and
    /// `Format` for values that cannot be read as text.
    pub fn read_string(&mut self, i: i32) -> Result<Option<String>> {
        let (offset, v) = match self.read_property(i)? {
            None | Some((_, PofValue::Null)) => return Ok(None),
            Some(p) => p,
        };
        match v {
            PofValue::String(s) => Ok(Some(s)),
            PofValue::Binary(b) => String::from_utf8(b.to_vec())
                .map(Some)
                .map_err(|e| Error::utf(offset, e.to_string())),
            PofValue::Char16Array(chars) => String::from_utf16(&chars)
                .map(Some)
                .map_err(|e| Error::utf(offset, e.to_string())),
            ref x if is_empty_collection(x) => Ok(Some(String::new())),
            other => Err(mismatch(offset, &other, "char-string")),
        }
    }

    /// Read an octet-string property.
    pub fn read_binary(&mut self, i: i32) -> Result<Option<Binary>> {
        let (offset, v) = match self.read_property(i)? {
            None | Some((_, PofValue::Null)) => return Ok(None),
            Some(p) => p,
        };
        match v {
            PofValue::Binary(b) => Ok(Some(b)),
            PofValue::String(s) => Ok(Some(Binary::from(s.into_bytes()))),
            other => {
                let items = elements(other, offset, "octet-string")?;
                let bytes = items
                    .iter()
                    .map(|x| to_i64(x).map(|n| n as u8).ok_or_else(|| mismatch(offset, x, "octet")))
                    .collect::<Result<Vec<u8>>>()?;
                Ok(Some(Binary::from(bytes)))
            }
        }
    }

    // ========================================================================
    // Date and time
    // ========================================================================

    /// Read a date property; a date-time yields its date part.
    pub fn read_date(&mut self, i: i32) -> Result<Option<RawDate>> {
        self.read_with(i, "date", |v| match v {
            PofValue::Date(d) => Ok(d),
            PofValue::DateTime(dt) => Ok(dt.date()),
            other => Err(other),
        })
    }

    /// Read a time property; a date-time yields its time part.
    pub fn read_time(&mut self, i: i32) -> Result<Option<RawTime>> {
        self.read_with(i, "time", |v| match v {
            PofValue::Time(t) => Ok(t),
            PofValue::DateTime(dt) => Ok(dt.time()),
            other => Err(other),
        })
    }

    /// Read a date-time property; a bare date reads as local midnight.
    pub fn read_date_time(&mut self, i: i32) -> Result<Option<RawDateTime>> {
        let midnight = RawTime::new(0, 0, 0, 0)?;
        self.read_with(i, "datetime", |v| match v {
            PofValue::DateTime(dt) => Ok(dt),
            PofValue::Date(d) => Ok(RawDateTime::new(d, midnight)),
            other => Err(other),
        })
    }

    /// Read a year-month interval property.
    pub fn read_year_month_interval(&mut self, i: i32) -> Result<Option<RawYearMonthInterval>> {
        self.read_with(i, "year-month-interval", |v| match v {
            PofValue::YearMonthInterval(x) => Ok(x),
            other => Err(other),
        })
    }

    /// Read a time interval property.
    pub fn read_time_interval(&mut self, i: i32) -> Result<Option<RawTimeInterval>> {
        self.read_with(i, "time-interval", |v| match v {
            PofValue::TimeInterval(x) => Ok(x),
            other => Err(other),
        })
    }

    /// Read a day-time interval property.
    pub fn read_day_time_interval(&mut self, i: i32) -> Result<Option<RawDayTimeInterval>> {
        self.read_with(i, "day-time-interval", |v| match v {
            PofValue::DayTimeInterval(x) => Ok(x),
            other => Err(other),
        })
    }

    // ========================================================================
    // Arrays
    // ========================================================================

    /// Read a boolean array property.
    pub fn read_bool_array(&mut self, i: i32) -> Result<Option<Vec<bool>>> {
        self.read_array_of(
            i,
            "boolean[]",
            |v| match v {
                PofValue::BoolArray(x) => Ok(x),
                other => Err(other),
            },
            |x| to_i64(x).map(|n| n != 0),
        )
    }

    /// Read an octet array property.
    pub fn read_octet_array(&mut self, i: i32) -> Result<Option<Vec<u8>>> {
        self.read_array_of(
            i,
            "octet[]",
            |v| match v {
                PofValue::Binary(b) => Ok(b.to_vec()),
                other => Err(other),
            },
            |x| to_i64(x).map(|n| n as u8),
        )
    }

    /// Read a character array property.
    pub fn read_char16_array(&mut self, i: i32) -> Result<Option<Vec<u16>>> {
        self.read_array_of(
            i,
            "char[]",
            |v| match v {
                PofValue::Char16Array(x) => Ok(x),
                PofValue::String(s) => Ok(s.encode_utf16().collect()),
                other => Err(other),
            },
            |x| to_i64(x).map(|n| n as u16),
        )
    }

    /// Read a 16-bit integer array property.
    pub fn read_i16_array(&mut self, i: i32) -> Result<Option<Vec<i16>>> {
        self.read_array_of(
            i,
            "int16[]",
            |v| match v {
                PofValue::Int16Array(x) => Ok(x),
                other => Err(other),
            },
            |x| to_i64(x).map(|n| n as i16),
        )
    }

    /// Read a 32-bit integer array property.
    pub fn read_i32_array(&mut self, i: i32) -> Result<Option<Vec<i32>>> {
        self.read_array_of(
            i,
            "int32[]",
            |v| match v {
                PofValue::Int32Array(x) => Ok(x),
                other => Err(other),
            },
            |x| to_i64(x).map(|n| n as i32),
        )
    }

    /// Read a 64-bit integer array property.
    pub fn read_i64_array(&mut self, i: i32) -> Result<Option<Vec<i64>>> {
        self.read_array_of(
            i,
            "int64[]",
            |v| match v {
                PofValue::Int64Array(x) => Ok(x),
                other => Err(other),
            },
            to_i64,
        )
    }

    /// Read a 32-bit float array property.
    pub fn read_f32_array(&mut self, i: i32) -> Result<Option<Vec<f32>>> {
        self.read_array_of(
            i,
            "float32[]",
            |v| match v {
                PofValue::Float32Array(x) => Ok(x),
                other => Err(other),
            },
            |x| to_f64(x).map(|f| f as f32),
        )
    }

    /// Read a 64-bit float array property.
    pub fn read_f64_array(&mut self, i: i32) -> Result<Option<Vec<f64>>> {
        self.read_array_of(
            i,
            "float64[]",
            |v| match v {
                PofValue::Float64Array(x) => Ok(x),
                other => Err(other),
            },
            to_f64,
        )
    }

    // ========================================================================
    // Complex values
    // ========================================================================

    /// Read an array property as values of any type.
    pub fn read_array(&mut self, i: i32) -> Result<Option<Vec<PofValue>>> {
        self.read_elements(i, "array")
    }

    /// Read a collection property.
    pub fn read_collection(&mut self, i: i32) -> Result<Option<Vec<PofValue>>> {
        self.read_elements(i, "collection")
    }

    fn read_elements(&mut self, i: i32, target: &str) -> Result<Option<Vec<PofValue>>> {
        match self.read_property(i)? {
            None | Some((_, PofValue::Null)) => Ok(None),
            Some((offset, v)) => elements(v, offset, target).map(Some),
        }
    }

    /// Read a sparse array property. Dense arrays are accepted; their null
    /// elements are left out.
    pub fn read_sparse_array(&mut self, i: i32) -> Result<Option<BTreeMap<i32, PofValue>>> {
        let (offset, v) = match self.read_property(i)? {
            None | Some((_, PofValue::Null)) => return Ok(None),
            Some(p) => p,
        };
        if let PofValue::SparseArray(m) = v {
            return Ok(Some(m));
        }
        let items = elements(v, offset, "sparse-array")?;
        Ok(Some(
            items
                .into_iter()
                .enumerate()
                .filter(|(_, x)| !x.is_null())
                .map(|(n, x)| (n as i32, x))
                .collect(),
        ))
    }

    /// Read a map property as key/value pairs in stream order.
    pub fn read_map(&mut self, i: i32) -> Result<Option<Vec<(PofValue, PofValue)>>> {
        self.read_with(i, "map", |v| match v {
            PofValue::Map(entries) => Ok(entries),
            x if is_empty_collection(&x) => Ok(Vec::new()),
            other => Err(other),
        })
    }

    /// Read a user-type property.
    pub fn read_user_type(&mut self, i: i32) -> Result<Option<PofObject>> {
        self.read_with(i, "user type", |v| match v {
            PofValue::Object(o) => Ok(o),
            other => Err(other),
        })
    }

    /// Read a property of any type.
    pub fn read_object(&mut self, i: i32) -> Result<PofValue> {
        Ok(self.read_property(i)?.map_or(PofValue::Null, |(_, v)| v))
    }
}
