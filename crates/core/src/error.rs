//! Error types for gridwire
//!
//! This module defines the single error type used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Every variant maps onto an [`ErrorKind`], which is what callers match on
//! when they need to tell "stream ended" apart from "caller passed a bad
//! offset", or a protocol-ordering bug apart from corrupted data.

use std::io;
use thiserror::Error;

/// Result type alias for gridwire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An offset/length pair fell outside a buffer
    IndexOutOfBounds,
    /// A read crossed the end of the stream
    Eof,
    /// Malformed UTF-8 data
    UtfDataFormat,
    /// Structurally invalid POF or decoration data
    Format,
    /// A caller supplied an invalid argument (including property ordering)
    IllegalArgument,
    /// An operation was invoked in the wrong state
    IllegalState,
    /// An allocation could not be satisfied
    OutOfMemory,
    /// A daemon thread was interrupted
    Interrupted,
    /// Event processing was ended early on purpose
    EventDeath,
    /// Underlying I/O failure
    Io,
    /// Configuration could not be loaded or validated
    Config,
}

/// Error types for gridwire
#[derive(Debug, Error)]
pub enum Error {
    /// Offset/length outside of the addressable range
    #[error("index out of bounds: offset={offset}, length={length}, bound={bound}")]
    IndexOutOfBounds {
        /// Requested offset
        offset: usize,
        /// Requested length
        length: usize,
        /// Length of the addressed buffer
        bound: usize,
    },

    /// Read past the end of a stream
    #[error("offset {offset}: end of stream: {detail}")]
    Eof {
        /// Stream offset at which the end was hit
        offset: usize,
        /// What was being read
        detail: String,
    },

    /// Invalid UTF-8 sequence
    #[error("offset {offset}: UTF data format: {detail}")]
    UtfDataFormat {
        /// Offset of the offending octet
        offset: usize,
        /// Description of the problem
        detail: String,
    },

    /// Structurally invalid stream content
    #[error("offset {offset}: {detail}")]
    Format {
        /// Stream offset at which the problem was detected
        offset: usize,
        /// Description including expected vs. actual structure
        detail: String,
    },

    /// Invalid argument
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// Invalid state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Allocation failure; carries no payload so that reporting it never allocates
    #[error("out of memory")]
    OutOfMemory,

    /// Daemon interruption
    #[error("thread interrupted")]
    Interrupted,

    /// Signals a normal early exit from event processing
    #[error("event death")]
    EventDeath,

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Error::Eof { .. } => ErrorKind::Eof,
            Error::UtfDataFormat { .. } => ErrorKind::UtfDataFormat,
            Error::Format { .. } => ErrorKind::Format,
            Error::IllegalArgument(_) => ErrorKind::IllegalArgument,
            Error::IllegalState(_) => ErrorKind::IllegalState,
            Error::OutOfMemory => ErrorKind::OutOfMemory,
            Error::Interrupted => ErrorKind::Interrupted,
            Error::EventDeath => ErrorKind::EventDeath,
            Error::Io(_) => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Create an out-of-bounds error
    pub fn out_of_bounds(offset: usize, length: usize, bound: usize) -> Self {
        Error::IndexOutOfBounds {
            offset,
            length,
            bound,
        }
    }

    /// Create an end-of-stream error
    pub fn eof(offset: usize, detail: impl Into<String>) -> Self {
        Error::Eof {
            offset,
            detail: detail.into(),
        }
    }

    /// Create a UTF data format error
    pub fn utf(offset: usize, detail: impl Into<String>) -> Self {
        Error::UtfDataFormat {
            offset,
            detail: detail.into(),
        }
    }

    /// Create a stream format error
    pub fn format(offset: usize, detail: impl Into<String>) -> Self {
        Error::Format {
            offset,
            detail: detail.into(),
        }
    }

    /// Create an illegal argument error
    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        Error::IllegalArgument(msg.into())
    }

    /// Create an illegal state error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Check if this error is an end-of-stream condition
    pub fn is_eof(&self) -> bool {
        self.kind() == ErrorKind::Eof
    }

    /// Convert a bounds error raised while reading a stream into EOF.
    ///
    /// Sequential readers report running off the end of their buffer as EOF
    /// so that decode loops can distinguish it from a bad caller offset.
    pub fn into_eof(self, offset: usize) -> Self {
        match self {
            Error::IndexOutOfBounds { .. } => Error::eof(offset, self.to_string()),
            other => other,
        }
    }
}
