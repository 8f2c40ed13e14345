//! Periodic Daemon Tests
//!
//! Daemons that wake on a timer rather than on notification.

use crate::common::*;
use gridwire::{Daemon, DaemonContext, DaemonHandler, DaemonState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counts timer wakeups.
struct Ticker {
    ticks: Arc<AtomicU64>,
}

impl DaemonHandler for Ticker {
    fn on_notify(&mut self, _ctx: &DaemonContext) -> Result<()> {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Sleeps between rounds and records whether a sleep was cut short.
struct Sleeper {
    asleep: Arc<AtomicBool>,
    cut_short: Arc<AtomicU64>,
}

impl DaemonHandler for Sleeper {
    fn on_wait(&mut self, ctx: &DaemonContext) -> Result<()> {
        self.asleep.store(true, Ordering::Release);
        if !ctx.sleep(60_000) {
            self.cut_short.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[test]
fn test_wait_time_drives_ticks() {
    init_tracing();
    let ticks = Arc::new(AtomicU64::new(0));
    let daemon = Daemon::new(Ticker {
        ticks: Arc::clone(&ticks),
    });
    daemon.set_thread_name("ticker").unwrap();
    daemon.set_wait_millis(5).unwrap();
    daemon.start().unwrap();

    assert!(wait_until(|| ticks.load(Ordering::Relaxed) >= 5));

    daemon.stop();
    assert!(daemon.join(0));
    assert_eq!(daemon.state(), DaemonState::Exited);
}

#[test]
fn test_stop_cuts_sleep_short() {
    init_tracing();
    let asleep = Arc::new(AtomicBool::new(false));
    let cut_short = Arc::new(AtomicU64::new(0));
    let daemon = Daemon::new(Sleeper {
        asleep: Arc::clone(&asleep),
        cut_short: Arc::clone(&cut_short),
    });
    daemon.start().unwrap();
    assert!(wait_until(|| asleep.load(Ordering::Acquire)));

    let begun = Instant::now();
    daemon.stop();
    assert!(daemon.join(5_000));
    assert!(begun.elapsed() < Duration::from_secs(5));
    assert_eq!(cut_short.load(Ordering::Relaxed), 1);
    assert_eq!(daemon.context().interrupt_count(), 1);
}

#[test]
fn test_notification_beats_long_wait() {
    let ticks = Arc::new(AtomicU64::new(0));
    let daemon = Daemon::new(Ticker {
        ticks: Arc::clone(&ticks),
    });
    daemon.set_wait_millis(60_000).unwrap();
    daemon.start().unwrap();

    daemon.set_notification(true);
    assert!(wait_until(|| ticks.load(Ordering::Relaxed) >= 1));

    daemon.stop();
    assert!(daemon.join(0));
}

#[test]
fn test_drop_stops_worker() {
    let ticks = Arc::new(AtomicU64::new(0));
    let ctx = {
        let daemon = Daemon::new(Ticker {
            ticks: Arc::clone(&ticks),
        });
        daemon.start().unwrap();
        Arc::clone(daemon.context())
    };
    assert!(ctx.is_exiting());
    assert!(wait_until(|| ctx.state() == DaemonState::Exited));
}
