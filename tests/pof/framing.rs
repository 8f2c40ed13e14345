//! Framing Tests
//!
//! POF payloads behind the format byte, int decorations and decorated
//! binaries.

use crate::common::*;
use gridwire::io::{
    decorate_binary, extract_int_decoration, is_int_decorated, remove_int_decoration,
    FMT_BIN_DECO, FMT_EXT,
};
use gridwire::pof::constants::{T_CHAR_STRING, V_INT_0};

/// `[FMT_BIN_DECO][mask][packed len][value binary]`
fn bin_decorated(mask: u8, value: &Binary) -> Binary {
    let mut buf = BinaryWriteBuffer::new(16 + value.len());
    {
        let mut out = buf.buffer_output();
        out.write_u8(FMT_BIN_DECO).unwrap();
        out.write_u8(mask).unwrap();
        out.write_i32(value.len() as i32).unwrap();
        out.write_buffer(value).unwrap();
    }
    buf.into_binary()
}

#[test]
fn test_to_binary_starts_with_format_byte() {
    let ctx = SimplePofContext::new();
    let helper = SerializationHelper::new();

    let bin = helper.to_binary(&PofValue::Int32(3), &ctx).unwrap();
    // tiny ints are a single packed type id
    let mut expected = BinaryWriteBuffer::new(4);
    {
        let mut out = expected.buffer_output();
        out.write_u8(FMT_EXT).unwrap();
        out.write_i32(V_INT_0 - 3).unwrap();
    }
    assert_eq!(bin, expected.into_binary());
}

#[test]
fn test_string_payload() {
    let ctx = SimplePofContext::new();
    let helper = SerializationHelper::new();

    let bin = helper
        .to_binary(&PofValue::String("grid".into()), &ctx)
        .unwrap();
    let mut expected = BinaryWriteBuffer::new(8);
    {
        let mut out = expected.buffer_output();
        out.write_u8(FMT_EXT).unwrap();
        out.write_i32(T_CHAR_STRING).unwrap();
        out.write_string(Some("grid")).unwrap();
    }
    assert_eq!(bin, expected.into_binary());
    assert_eq!(
        helper.from_binary(&bin, &ctx).unwrap(),
        PofValue::String("grid".into())
    );
}

#[test]
fn test_int_decorated_payload_reads_through() {
    let ctx = SimplePofContext::new();
    let helper = SerializationHelper::new();
    let value = PofValue::Int64Array(vec![1, -1, i64::MAX]);

    let bin = helper.to_binary(&value, &ctx).unwrap();
    let decorated = decorate_binary(&bin, 7).unwrap();

    assert!(is_int_decorated(&decorated));
    assert!(!is_int_decorated(&bin));
    assert_eq!(extract_int_decoration(&decorated).unwrap(), 7);
    assert_eq!(remove_int_decoration(&decorated).unwrap(), bin);
    assert_eq!(helper.from_binary(&decorated, &ctx).unwrap(), value);
}

#[test]
fn test_decorated_binary_with_value() {
    let ctx = SimplePofContext::new();
    let helper = SerializationHelper::new();
    let value = PofValue::Bool(true);

    let inner = helper.to_binary(&value, &ctx).unwrap();
    let bin = bin_decorated(0b0000_0011, &inner);
    assert_eq!(helper.from_binary(&bin, &ctx).unwrap(), value);
}

#[test]
fn test_decorated_binary_without_value() {
    let ctx = SimplePofContext::new();
    let helper = SerializationHelper::new();

    let inner = helper.to_binary(&PofValue::Bool(true), &ctx).unwrap();
    let bin = bin_decorated(0b0000_0010, &inner);
    let err = helper.from_binary(&bin, &ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eof);
    assert!(err.to_string().contains("Decorated value is missing a value"));
}

#[test]
fn test_unknown_format_byte() {
    let ctx = SimplePofContext::new();
    let helper = SerializationHelper::new();

    let err = helper
        .from_binary(&Binary::from(vec![0u8, 1, 2]), &ctx)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_malformed_decoration() {
    let bin = Binary::from(vec![13u8, 0x80]);
    assert_eq!(
        extract_int_decoration(&bin).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
    assert_eq!(
        remove_int_decoration(&bin).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
    assert!(!is_int_decorated(&Binary::empty()));
}

#[test]
fn test_helper_learns_buffer_size() {
    let ctx = order_context();
    let helper = SerializationHelper::new();
    assert_eq!(helper.buffer_size_hint::<PofValue>(), None);

    let order = PofValue::Object(PofObject::new(sample_order(1, 20)));
    let bin = helper.to_binary(&order, &ctx).unwrap();

    let hint = helper.buffer_size_hint::<PofValue>().unwrap();
    assert!(hint >= bin.len());
    assert_eq!(hint % 16, 0);
}
