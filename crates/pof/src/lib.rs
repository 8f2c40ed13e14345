//! Portable Object Format (POF) codec for gridwire
//!
//! This crate encodes values and user types into the compact, self-describing
//! POF stream and back:
//! - constants: type ids, compact value ids and tiny-int helpers
//! - raw: date, time and interval values with POF validation rules
//! - handler: the low-level event encoder
//! - writer / reader: user-type aware sessions with ordered properties,
//!   nested user types, remainders and object identities
//! - skip: stepping over encoded values without decoding them
//! - context: the user-type registry and the top-level `Serializer`
//!
//! User types implement [`PortableObject`]; types that must round-trip
//! through older or newer peers also expose an [`Evolvable`] view.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod context;
mod handler;
pub mod portable;
pub mod raw;
pub mod reader;
pub mod reference;
pub mod skip;
pub mod value;
pub mod writer;

pub use context::{PofContext, PofSerializer, PortableObjectSerializer, SimplePofContext};
pub use portable::{AsAny, Evolvable, EvolvableData, PortableObject};
pub use raw::{
    RawDate, RawDateTime, RawDayTimeInterval, RawTime, RawTimeInterval, RawYearMonthInterval,
    TimeZone,
};
pub use reader::{PofBufferReader, PofReader, EOPS};
pub use reference::ReferenceLibrary;
pub use skip::{skip_ints, skip_uniform_value, skip_value};
pub use value::{PofObject, PofValue};
pub use writer::{PofBufferWriter, PofWriter, MAX_NESTING};
