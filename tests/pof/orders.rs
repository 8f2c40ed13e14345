//! Order Tests
//!
//! Nested user types through the top-level `Serializer`, shared between
//! threads and with identities enabled.

use crate::common::*;
use gridwire::pof::ReferenceLibrary;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_order_round_trip() {
    init_tracing();
    let ctx = order_context();
    let order = sample_order(42, 3);

    let back = round_trip(&ctx, &PofValue::Object(PofObject::new(order.clone())));
    assert_eq!(object_as::<Order>(&back), order);
}

#[test]
fn test_order_without_lines() {
    let ctx = order_context();
    let order = sample_order(7, 0);

    let back = round_trip(&ctx, &PofValue::Object(PofObject::new(order.clone())));
    assert_eq!(object_as::<Order>(&back), order);
}

#[test]
fn test_orders_in_a_map() {
    let ctx = order_context();
    let entries: Vec<(PofValue, PofValue)> = (0..5)
        .map(|i| {
            (
                PofValue::Int64(i),
                PofValue::Object(PofObject::new(sample_order(i, i as usize))),
            )
        })
        .collect();

    let back = round_trip(&ctx, &PofValue::Map(entries.clone()));
    let PofValue::Map(back) = back else {
        panic!("expected a map, got {:?}", back);
    };
    assert_eq!(back.len(), 5);
    for ((k1, v1), (k2, v2)) in entries.iter().zip(back.iter()) {
        assert_eq!(k1, k2);
        assert_eq!(object_as::<Order>(v1), object_as::<Order>(v2));
    }
}

#[test]
fn test_unregistered_type_is_rejected() {
    let ctx = SimplePofContext::new();
    let mut buf = BinaryWriteBuffer::new(16);
    let err = ctx
        .serialize(
            &mut buf.buffer_output(),
            &PofValue::Object(PofObject::new(sample_order(1, 1))),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalArgument);
}

#[test]
fn test_shared_line_written_once_with_references() {
    let mut ctx = order_context();
    ctx.set_reference_enabled(true);

    let line = PofObject::new(OrderLine {
        sku: "shared".into(),
        quantity: 1,
        price: 1.0,
    });
    let value = PofValue::Array(vec![
        PofValue::Object(line.clone()),
        PofValue::Object(line.clone()),
    ]);

    let with_refs = encode(&ctx, &value);
    let back = decode(&ctx, &with_refs);
    let PofValue::Array(items) = back else {
        panic!("expected an array");
    };
    let a = items[0].as_object().unwrap();
    let b = items[1].as_object().unwrap();
    assert!(a.ptr_eq(b));

    ctx.set_reference_enabled(false);
    let without_refs = encode(&ctx, &value);
    assert!(without_refs.len() > with_refs.len());
}

#[test]
fn test_reference_library_is_per_call() {
    let mut ctx = order_context();
    ctx.set_reference_enabled(true);
    let value = PofValue::Object(PofObject::new(sample_order(9, 2)));

    // a second call starts a fresh library, so the output is identical
    assert_eq!(encode(&ctx, &value), encode(&ctx, &value));

    let mut library = ReferenceLibrary::new();
    let obj = PofObject::new(sample_order(1, 0));
    let id = library.register(&obj);
    assert_eq!(library.identity_of(&obj), Some(id));
}

#[test]
fn test_context_shared_across_threads() {
    let ctx = Arc::new(order_context());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..50 {
                    let order = sample_order(t * 1_000 + i, (i % 4) as usize);
                    let back = round_trip(&ctx, &PofValue::Object(PofObject::new(order.clone())));
                    assert_eq!(object_as::<Order>(&back), order);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
