//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from any suite's
//! main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;
use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

pub use gridwire::pof::{PofBufferReader, PofBufferWriter};
pub use gridwire::{
    Binary, BinaryWriteBuffer, BufferInput, Error, ErrorKind, GridwireConfig, PofObject,
    PofReader, PofValue, PofWriter, PortableObject, Result, SerializationHelper, Serializer,
    SimplePofContext,
};
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once per process. Set `RUST_LOG` to see output.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// Test types
// ============================================================================

pub const ORDER_TYPE: i32 = 2001;
pub const LINE_TYPE: i32 = 2002;

/// One line of an order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: i32,
    pub price: f64,
}

impl PortableObject for OrderLine {
    fn read_external(&mut self, reader: &mut PofReader<'_, '_>) -> Result<()> {
        self.sku = reader.read_string(0)?.unwrap_or_default();
        self.quantity = reader.read_i32(1)?;
        self.price = reader.read_f64(2)?;
        Ok(())
    }

    fn write_external(&self, writer: &mut PofWriter<'_, '_>) -> Result<()> {
        writer.write_string(0, &self.sku)?;
        writer.write_i32(1, self.quantity)?;
        writer.write_f64(2, self.price)
    }
}

/// An order with nested lines.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer: String,
    pub lines: Vec<OrderLine>,
}

impl PortableObject for Order {
    fn read_external(&mut self, reader: &mut PofReader<'_, '_>) -> Result<()> {
        self.id = reader.read_i64(0)?;
        self.customer = reader.read_string(1)?.unwrap_or_default();
        self.lines = reader
            .read_collection(2)?
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_object()?.with(|line: &OrderLine| line.clone()))
            .collect();
        Ok(())
    }

    fn write_external(&self, writer: &mut PofWriter<'_, '_>) -> Result<()> {
        writer.write_i64(0, self.id)?;
        writer.write_string(1, &self.customer)?;
        let lines: Vec<PofValue> = self
            .lines
            .iter()
            .map(|line| PofValue::Object(PofObject::new(line.clone())))
            .collect();
        writer.write_collection(2, &lines)
    }
}

/// Context with the order types registered.
pub fn order_context() -> SimplePofContext {
    let mut ctx = SimplePofContext::new();
    ctx.register_user_type::<Order>(ORDER_TYPE).unwrap();
    ctx.register_user_type::<OrderLine>(LINE_TYPE).unwrap();
    ctx
}

/// A small order with `n` lines.
pub fn sample_order(id: i64, n: usize) -> Order {
    Order {
        id,
        customer: format!("customer-{}", id),
        lines: (0..n)
            .map(|i| OrderLine {
                sku: format!("sku-{}", i),
                quantity: i as i32 + 1,
                price: 9.5 * (i as f64 + 1.0),
            })
            .collect(),
    }
}

// ============================================================================
// Encoding helpers
// ============================================================================

/// Serialize a value through a context's `Serializer` implementation.
pub fn encode(ctx: &SimplePofContext, value: &PofValue) -> Binary {
    let mut buf = BinaryWriteBuffer::new(64);
    ctx.serialize(&mut buf.buffer_output(), value)
        .expect("serialize");
    buf.into_binary()
}

/// Deserialize a value that must span the whole binary.
pub fn decode(ctx: &SimplePofContext, bin: &Binary) -> PofValue {
    let mut input = BufferInput::new(bin.clone());
    let value = ctx.deserialize(&mut input).expect("deserialize");
    assert_eq!(input.offset(), bin.len(), "trailing bytes after value");
    value
}

/// Encode then decode.
pub fn round_trip(ctx: &SimplePofContext, value: &PofValue) -> PofValue {
    decode(ctx, &encode(ctx, value))
}

/// Pull the typed object out of a decoded value.
pub fn object_as<T: PortableObject + Clone>(value: &PofValue) -> T {
    value
        .as_object()
        .and_then(|obj| obj.with(|t: &T| t.clone()))
        .expect("expected a user type")
}

// ============================================================================
// Config files
// ============================================================================

/// A temp dir holding a `gridwire.toml` with the given content.
pub fn config_dir(content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join(gridwire::CONFIG_FILE_NAME);
    std::fs::write(&path, content).expect("Failed to write config");
    (dir, path)
}

// ============================================================================
// Waiting
// ============================================================================

/// Poll `f` until it holds or five seconds pass.
pub fn wait_until(f: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    f()
}
