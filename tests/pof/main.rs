//! POF Integration Tests
//!
//! Cross-crate tests: POF values and user types travelling through the
//! io framing layer, configured from `gridwire.toml`.

#[path = "../common/mod.rs"]
mod common;

mod config;
mod framing;
mod orders;
mod temporal;
