//! gridwire - client-side data grid primitives
//!
//! gridwire bundles the pieces a data grid client is built from:
//! - the Portable Object Format (POF) codec for values and user types
//! - byte buffers with the packed-integer and UTF-8 codecs
//! - daemon worker threads and the dual queue they drain
//!
//! # Quick Start
//!
//! ```
//! use gridwire::{PofValue, SerializationHelper, SimplePofContext};
//!
//! let ctx = SimplePofContext::new();
//! let helper = SerializationHelper::new();
//!
//! let value = PofValue::String("hello".into());
//! let bin = helper.to_binary(&value, &ctx)?;
//! assert_eq!(helper.from_binary(&bin, &ctx)?, value);
//! # Ok::<(), gridwire::Error>(())
//! ```
//!
//! # Architecture
//!
//! Each layer lives in its own crate. [`io`], [`pof`] and [`concurrency`]
//! are re-exported as modules; the error, binary and configuration types of
//! `gridwire-core` and the most used types of the other crates are
//! available at the root.

pub use gridwire_concurrency as concurrency;
pub use gridwire_io as io;
pub use gridwire_pof as pof;

pub use gridwire_concurrency::{
    ConcurrentQueue, Daemon, DaemonContext, DaemonHandler, DaemonState, DualQueue, Monitor,
    QueueProcessor,
};
pub use gridwire_core::{
    Binary, DaemonConfig, Error, ErrorKind, GridwireConfig, PofConfig, QueueConfig, Result,
    CONFIG_FILE_NAME,
};
pub use gridwire_io::{BinaryWriteBuffer, BufferInput, BufferOutput, SerializationHelper, Serializer};
pub use gridwire_pof::{
    Evolvable, EvolvableData, PofContext, PofObject, PofReader, PofValue, PofWriter,
    PortableObject, SimplePofContext,
};
