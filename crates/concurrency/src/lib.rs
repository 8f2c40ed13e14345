//! Thread primitives for gridwire
//!
//! This crate provides the worker-thread building blocks used by the client:
//! - Monitor: a lock plus condition variable shared between threads
//! - Daemon: a worker thread with a monotonic lifecycle and hook methods
//! - DualQueue: a head/tail split queue with batched notification
//! - QueueProcessor: a daemon that drains a DualQueue

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod daemon;
pub mod monitor;
pub mod processor;
pub mod queue;

pub use daemon::{Daemon, DaemonContext, DaemonHandler, DaemonState};
pub use monitor::{Monitor, MonitorGuard};
pub use processor::QueueProcessor;
pub use queue::{ConcurrentQueue, DualQueue, FlushState, QueueCore};
