//! Pipeline Tests
//!
//! Producers encode orders to POF binaries and a queue processor decodes
//! them on its own thread.

use crate::common::*;
use gridwire::{ConcurrentQueue, DaemonState, QueueProcessor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

/// A processor that decodes every binary into an `Order`.
fn order_sink(
    name: &str,
    ctx: Arc<SimplePofContext>,
) -> (QueueProcessor<Binary>, Arc<Mutex<Vec<Order>>>) {
    let orders = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&orders);
    let helper = SerializationHelper::new();
    let processor = QueueProcessor::new(name, move |bin: Binary| {
        let value = helper.from_binary(&bin, &*ctx)?;
        sink.lock().push(object_as::<Order>(&value));
        Ok(())
    });
    (processor, orders)
}

fn encode_order(helper: &SerializationHelper, ctx: &SimplePofContext, order: Order) -> Binary {
    helper
        .to_binary(&PofValue::Object(PofObject::new(order)), ctx)
        .unwrap()
}

#[test]
fn test_single_producer_order_preserved() {
    init_tracing();
    let ctx = Arc::new(order_context());
    let (processor, orders) = order_sink("orders-single", Arc::clone(&ctx));
    processor.start().unwrap();

    let helper = SerializationHelper::new();
    let sent: Vec<Order> = (0..200).map(|id| sample_order(id, (id % 5) as usize)).collect();
    for order in &sent {
        processor.add(encode_order(&helper, &ctx, order.clone()));
    }

    assert!(wait_until(|| orders.lock().len() == sent.len()));
    assert_eq!(*orders.lock(), sent);

    processor.stop();
    assert!(processor.join(0));
}

#[test]
fn test_many_producers() {
    init_tracing();
    const PRODUCERS: i64 = 4;
    const PER_PRODUCER: i64 = 250;

    let ctx = Arc::new(order_context());
    let (processor, orders) = order_sink("orders-many", Arc::clone(&ctx));
    let processor = Arc::new(processor);
    processor.start().unwrap();

    let barrier = Arc::new(Barrier::new(PRODUCERS as usize));
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let ctx = Arc::clone(&ctx);
            let processor = Arc::clone(&processor);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let helper = SerializationHelper::new();
                barrier.wait();
                for i in 0..PER_PRODUCER {
                    let order = sample_order(p * 10_000 + i, 2);
                    processor.add(encode_order(&helper, &ctx, order));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let total = (PRODUCERS * PER_PRODUCER) as usize;
    assert!(wait_until(|| orders.lock().len() == total));
    processor.stop();
    assert!(processor.join(0));

    // each producer's orders arrive in the order it sent them
    let mut last: HashMap<i64, i64> = HashMap::new();
    for order in orders.lock().iter() {
        let (producer, seq) = (order.id / 10_000, order.id % 10_000);
        if let Some(prev) = last.insert(producer, seq) {
            assert!(seq > prev, "producer {} went backwards", producer);
        }
        assert_eq!(order.lines.len(), 2);
    }
    assert_eq!(last.len(), PRODUCERS as usize);
    assert_eq!(processor.processed(), total as u64);
}

#[test]
fn test_corrupt_binary_is_skipped() {
    init_tracing();
    let ctx = Arc::new(order_context());
    let (processor, orders) = order_sink("orders-corrupt", Arc::clone(&ctx));
    processor.start().unwrap();

    let helper = SerializationHelper::new();
    processor.add(encode_order(&helper, &ctx, sample_order(1, 1)));
    processor.add(Binary::from(vec![0x7F, 0x01, 0x02]));
    processor.add(encode_order(&helper, &ctx, sample_order(2, 1)));

    assert!(wait_until(|| orders.lock().len() == 2));
    assert_eq!(processor.processed(), 3);
    assert_eq!(processor.state(), DaemonState::Running);
    let ids: Vec<i64> = orders.lock().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2]);

    processor.stop();
    assert!(processor.join(0));
}

#[test]
fn test_urgent_order_jumps_queue() {
    let ctx = Arc::new(order_context());
    let (processor, orders) = order_sink("orders-urgent", Arc::clone(&ctx));
    processor.queue().set_batch_size(64).unwrap();

    let helper = SerializationHelper::new();
    for id in 1..=3 {
        processor.add(encode_order(&helper, &ctx, sample_order(id, 0)));
    }
    processor.add_head(encode_order(&helper, &ctx, sample_order(0, 0)));

    // queued before start; flushed explicitly afterwards
    processor.start().unwrap();
    processor.flush();
    assert!(wait_until(|| orders.lock().len() == 4));
    let ids: Vec<i64> = orders.lock().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    processor.stop();
    assert!(processor.join(0));
}
