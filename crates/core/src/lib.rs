//! Core types for gridwire
//!
//! This crate defines the foundational pieces shared by every other crate:
//! - Error: unified error type and [`ErrorKind`] taxonomy
//! - Binary: immutable, shareable byte snapshots
//! - Config: `gridwire.toml` client configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary;
pub mod config;
pub mod error;

pub use binary::{check_range, Binary};
pub use config::{DaemonConfig, GridwireConfig, PofConfig, QueueConfig, CONFIG_FILE_NAME};
pub use error::{Error, ErrorKind, Result};
