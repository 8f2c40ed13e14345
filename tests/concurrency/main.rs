//! Concurrency Integration Tests
//!
//! Daemons and queue processors working with the POF codec.

#[path = "../common/mod.rs"]
mod common;

mod config;
mod periodic;
mod pipeline;
