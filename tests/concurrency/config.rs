//! Config Tests
//!
//! Daemon and queue settings loaded from `gridwire.toml`.

use crate::common::*;
use gridwire::{
    ConcurrentQueue, Daemon, DaemonContext, DaemonHandler, DaemonState, DualQueue, QueueProcessor,
};
use std::sync::Arc;

const CONFIG: &str = r#"
[daemon]
thread_name = "ingest"
wait_millis = 25

[queue]
batch_size = 8
"#;

struct Idle;

impl DaemonHandler for Idle {}

fn load() -> GridwireConfig {
    let (_dir, path) = config_dir(CONFIG);
    GridwireConfig::from_file(&path).unwrap()
}

#[test]
fn test_daemon_from_config() {
    let config = load();
    let daemon = Daemon::from_config(Idle, &config.daemon);
    assert_eq!(daemon.thread_name(), "ingest");
    assert_eq!(daemon.wait_millis(), 25);

    daemon.start().unwrap();
    // fixed once started
    assert_eq!(
        daemon.set_wait_millis(0).unwrap_err().kind(),
        ErrorKind::IllegalState
    );
    daemon.stop();
    assert!(daemon.join(0));
    assert_eq!(daemon.state(), DaemonState::Exited);
}

#[test]
fn test_queue_from_config() {
    let config = load();
    let queue: DualQueue<u32> = DualQueue::from_config(&config.queue);
    assert_eq!(queue.batch_size(), 8);

    for i in 0..7 {
        queue.add(i);
    }
    assert!(queue.is_flush_pending());
    queue.add(7);
    assert!(!queue.is_flush_pending());
    assert_eq!(queue.stats_flushed(), 1);
}

#[test]
fn test_processor_from_config() {
    init_tracing();
    let config = load();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let processor = QueueProcessor::from_config(&config, move |n: u32| {
        sink.lock().push(n);
        Ok(())
    });
    assert_eq!(processor.queue().batch_size(), 8);

    processor.start().unwrap();
    // a short batch is still picked up once the wait time elapses
    for i in 0..3 {
        processor.add(i);
    }
    assert!(wait_until(|| seen.lock().len() == 3));

    processor.stop();
    assert!(processor.join(0));
    assert_eq!(*seen.lock(), vec![0, 1, 2]);
}

#[test]
fn test_context_reports_settings() {
    let config = load();
    let daemon = Daemon::from_config(Idle, &config.daemon);
    let ctx: &Arc<DaemonContext> = daemon.context();
    assert_eq!(ctx.thread_name(), "ingest");
    assert!(ctx.start_timestamp().is_none());

    daemon.start().unwrap();
    assert!(ctx.start_timestamp().is_some());
    let text = ctx.to_string();
    assert!(text.contains("ThreadName=ingest"), "{}", text);
    assert!(text.contains("WaitTime=25"), "{}", text);
    daemon.stop();
    assert!(daemon.join(0));
}
