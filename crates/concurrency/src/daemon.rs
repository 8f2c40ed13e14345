//! Managed worker threads.
//!
//! A [`Daemon`] drives one dedicated OS thread through a fixed lifecycle:
//!
//! ```text
//! Initial -> Starting -> Running -> Exiting -> Exited
//! ```
//!
//! The state never moves backwards and an exited daemon cannot be started
//! again. Behavior is supplied by a [`DaemonHandler`] whose hooks run on the
//! worker thread:
//!
//! ```text
//! on_enter
//! while !exiting { on_wait; on_notify }
//! on_exit
//! ```
//!
//! Errors returned from a hook are dispatched by kind. `EventDeath` just
//! ends the current event, `Interrupted` goes to `on_interrupt`, anything
//! else goes to `on_exception`. A panic inside a hook is caught and handled
//! like an error.
//!
//! Rust threads cannot be interrupted, so interruption is cooperative: a
//! flag plus a notification on the daemon's lock. The default `on_wait`
//! and [`DaemonContext::check_interrupted`] observe and clear it.

use crate::monitor::Monitor;
use chrono::{DateTime, Utc};
use gridwire_core::{DaemonConfig, Error, ErrorKind, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long `start` waits per slice for the worker to report in.
const START_SLICE: Duration = Duration::from_secs(1);

// ============================================================================
// DaemonState
// ============================================================================

/// Lifecycle state of a daemon. Ordered; transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DaemonState {
    /// Created, not yet started
    Initial,
    /// Thread spawned, `on_enter` not yet finished
    Starting,
    /// Processing events
    Running,
    /// Asked to stop; the event loop is winding down
    Exiting,
    /// Thread finished; terminal
    Exited,
}

impl DaemonState {
    /// Name used in descriptions and logs.
    pub fn name(self) -> &'static str {
        match self {
            DaemonState::Initial => "initial",
            DaemonState::Starting => "starting",
            DaemonState::Running => "running",
            DaemonState::Exiting => "exiting",
            DaemonState::Exited => "exited",
        }
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// DaemonHandler
// ============================================================================

/// Hooks run by a daemon's worker thread.
///
/// Every hook has a default, so an implementation only overrides what it
/// needs. `on_notify` is where the work usually happens.
pub trait DaemonHandler: Send + 'static {
    /// Called once on the worker thread before the event loop starts.
    ///
    /// An error here is reported back to the caller of [`Daemon::start`]
    /// and also passed to `on_exception`.
    fn on_enter(&mut self, _ctx: &DaemonContext) -> Result<()> {
        Ok(())
    }

    /// Block until there is something to do.
    fn on_wait(&mut self, ctx: &DaemonContext) -> Result<()> {
        ctx.wait_for_notification()
    }

    /// Handle whatever the daemon was woken for.
    fn on_notify(&mut self, _ctx: &DaemonContext) -> Result<()> {
        Ok(())
    }

    /// Called with an unhandled error from another hook.
    ///
    /// The default logs the error and stops the daemon.
    fn on_exception(&mut self, ctx: &DaemonContext, err: &Error) {
        if ctx.is_exiting() {
            debug!(thread = %ctx.thread_name(), error = %err, "Daemon caught an error while exiting");
        } else {
            warn!(thread = %ctx.thread_name(), error = %err, "Daemon terminating due to unhandled error");
            ctx.stop();
        }
    }

    /// Called when a hook observed an interrupt.
    fn on_interrupt(&mut self, ctx: &DaemonContext) {
        if !ctx.is_exiting() {
            warn!(thread = %ctx.thread_name(), "Daemon interrupted");
        }
    }

    /// Called once on the worker thread after the event loop ends.
    fn on_exit(&mut self, _ctx: &DaemonContext) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// DaemonContext
// ============================================================================

struct Settings {
    thread_name: String,
    wait_millis: i64,
    lock: Arc<Monitor>,
}

/// State shared between a [`Daemon`] and its worker thread.
///
/// Hooks receive a reference to it, so they can stop the daemon, check for
/// interrupts, or wait on the lock.
pub struct DaemonContext {
    state: Mutex<DaemonState>,
    state_changed: Condvar,
    /// Serializes interrupt delivery against the exit sequence.
    exit_monitor: Mutex<()>,
    settings: Mutex<Settings>,
    thread: Mutex<Option<ThreadId>>,
    notification: AtomicBool,
    interrupted: AtomicBool,
    interrupts: AtomicU64,
    start_error: Mutex<Option<Error>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl DaemonContext {
    fn new(config: &DaemonConfig) -> Self {
        Self {
            state: Mutex::new(DaemonState::Initial),
            state_changed: Condvar::new(),
            exit_monitor: Mutex::new(()),
            settings: Mutex::new(Settings {
                thread_name: config.thread_name.clone(),
                wait_millis: config.wait_millis,
                lock: Arc::new(Monitor::new()),
            }),
            thread: Mutex::new(None),
            notification: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            interrupts: AtomicU64::new(0),
            start_error: Mutex::new(None),
            started_at: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> DaemonState {
        *self.state.lock()
    }

    /// True between `start` and the end of the exit sequence.
    pub fn is_started(&self) -> bool {
        let state = self.state();
        state > DaemonState::Initial && state < DaemonState::Exited
    }

    /// True once `stop` has been requested.
    pub fn is_exiting(&self) -> bool {
        self.state() >= DaemonState::Exiting
    }

    fn set_state(&self, next: DaemonState) {
        let mut state = self.state.lock();
        self.advance(&mut state, next);
    }

    /// Move forward to `next`; a regression is silently ignored.
    fn advance(&self, state: &mut DaemonState, next: DaemonState) {
        if next > *state {
            debug!(thread = %self.thread_name(), from = %*state, to = %next, "Daemon state change");
            *state = next;
            self.state_changed.notify_all();
        }
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn check_configurable(&self, property: &str) -> Result<()> {
        if self.state() != DaemonState::Initial {
            return Err(Error::illegal_state(format!(
                "{} cannot be changed once the daemon has started",
                property
            )));
        }
        Ok(())
    }

    /// Name given to the worker thread.
    pub fn thread_name(&self) -> String {
        self.settings.lock().thread_name.clone()
    }

    /// Milliseconds the default `on_wait` blocks for.
    pub fn wait_millis(&self) -> i64 {
        self.settings.lock().wait_millis
    }

    /// The lock used for notifications.
    pub fn lock(&self) -> Arc<Monitor> {
        Arc::clone(&self.settings.lock().lock)
    }

    /// When the worker thread entered its event loop.
    pub fn start_timestamp(&self) -> Option<DateTime<Utc>> {
        *self.started_at.lock()
    }

    fn is_worker_thread(&self) -> bool {
        *self.thread.lock() == Some(thread::current().id())
    }

    fn has_other_worker(&self) -> bool {
        match *self.thread.lock() {
            Some(id) => id != thread::current().id(),
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Notification and interruption
    // ------------------------------------------------------------------------

    /// True if a notification is pending.
    pub fn is_notification(&self) -> bool {
        self.notification.load(Ordering::Acquire)
    }

    /// Set or clear the notification flag.
    ///
    /// Setting it wakes the worker unless called from the worker itself.
    pub fn set_notification(&self, notify: bool) {
        let lock = self.lock();
        let _guard = lock.lock();
        self.notification.store(notify, Ordering::Release);
        if notify && self.has_other_worker() {
            lock.notify_all();
        }
    }

    /// Deliver an interrupt to the worker.
    pub fn interrupt(&self) {
        let lock = self.lock();
        let _guard = lock.lock();
        self.interrupted.store(true, Ordering::Release);
        self.interrupts.fetch_add(1, Ordering::Relaxed);
        lock.notify_all();
    }

    /// Number of interrupts delivered over the daemon's lifetime.
    pub fn interrupt_count(&self) -> u64 {
        self.interrupts.load(Ordering::Relaxed)
    }

    /// Consume a pending interrupt.
    ///
    /// # Errors
    ///
    /// Returns `Interrupted` if one was pending; the flag is cleared.
    pub fn check_interrupted(&self) -> Result<()> {
        if self.interrupted.swap(false, Ordering::AcqRel) {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    /// Default wait: block on the lock until notified, interrupted, or the
    /// wait time elapses, then clear the notification flag.
    pub fn wait_for_notification(&self) -> Result<()> {
        self.wait_for_notification_while(|| true)
    }

    /// Like [`wait_for_notification`](Self::wait_for_notification), but only
    /// blocks if `idle` still holds once the lock is taken.
    ///
    /// Producers that change the state `idle` reads and then notify the
    /// lock can never be missed.
    pub fn wait_for_notification_while(&self, idle: impl Fn() -> bool) -> Result<()> {
        self.check_interrupted()?;
        {
            let lock = self.lock();
            let mut guard = lock.lock();
            if !self.is_notification() && !self.interrupted.load(Ordering::Acquire) && idle() {
                lock.wait_millis(&mut guard, self.wait_millis());
            }
            self.notification.store(false, Ordering::Release);
        }
        self.check_interrupted()
    }

    /// Sleep on the lock for `millis`, waking early on interrupt.
    ///
    /// `0` yields instead. Returns `false` if the sleep was interrupted.
    pub fn sleep(&self, millis: u64) -> bool {
        if millis == 0 {
            thread::yield_now();
            return self.check_interrupted().is_ok();
        }
        let deadline = Instant::now() + Duration::from_millis(millis);
        let lock = self.lock();
        let mut guard = lock.lock();
        loop {
            if self.interrupted.swap(false, Ordering::AcqRel) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let left = deadline - now;
            lock.wait_millis(&mut guard, left.as_millis().max(1) as i64);
        }
    }

    // ------------------------------------------------------------------------
    // Stop
    // ------------------------------------------------------------------------

    /// Ask the daemon to stop.
    ///
    /// Only the first call has an effect: it moves the state to `Exiting`
    /// and interrupts the worker, unless called from the worker itself.
    pub fn stop(&self) {
        let _exit = self.exit_monitor.lock();
        if self.is_exiting() {
            return;
        }
        self.set_state(DaemonState::Exiting);
        if self.has_other_worker() {
            self.interrupt();
        }
    }
}

impl fmt::Display for DaemonContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let started = self
            .start_timestamp()
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);
        write!(
            f,
            "Daemon{{State={}, Notification={}, StartTimeStamp={}, WaitTime={}, ThreadName={}}}",
            self.state(),
            self.is_notification(),
            started,
            self.wait_millis(),
            self.thread_name()
        )
    }
}

impl fmt::Debug for DaemonContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// ============================================================================
// Daemon
// ============================================================================

/// A worker thread running a [`DaemonHandler`].
///
/// # Example
///
/// ```no_run
/// use gridwire_concurrency::{Daemon, DaemonContext, DaemonHandler};
/// use gridwire_core::Result;
///
/// struct Ticker;
///
/// impl DaemonHandler for Ticker {
///     fn on_notify(&mut self, _ctx: &DaemonContext) -> Result<()> {
///         println!("tick");
///         Ok(())
///     }
/// }
///
/// let daemon = Daemon::new(Ticker);
/// daemon.set_wait_millis(100).unwrap();
/// daemon.start().unwrap();
/// daemon.stop();
/// daemon.join(0);
/// ```
pub struct Daemon<H: DaemonHandler> {
    ctx: Arc<DaemonContext>,
    handler: Mutex<Option<H>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<H: DaemonHandler> Daemon<H> {
    /// Create a daemon with the default settings.
    pub fn new(handler: H) -> Self {
        Self::from_config(handler, &DaemonConfig::default())
    }

    /// Create a daemon with thread name and wait time from `config`.
    pub fn from_config(handler: H, config: &DaemonConfig) -> Self {
        Self {
            ctx: Arc::new(DaemonContext::new(config)),
            handler: Mutex::new(Some(handler)),
            handle: Mutex::new(None),
        }
    }

    /// The shared context the worker's hooks see.
    pub fn context(&self) -> &Arc<DaemonContext> {
        &self.ctx
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DaemonState {
        self.ctx.state()
    }

    /// True between `start` and the end of the exit sequence.
    pub fn is_started(&self) -> bool {
        self.ctx.is_started()
    }

    /// True once `stop` has been requested.
    pub fn is_exiting(&self) -> bool {
        self.ctx.is_exiting()
    }

    /// Name given to the worker thread.
    pub fn thread_name(&self) -> String {
        self.ctx.thread_name()
    }

    /// Set the worker thread's name.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` once the daemon has started.
    pub fn set_thread_name(&self, name: impl Into<String>) -> Result<()> {
        self.ctx.check_configurable("thread name")?;
        self.ctx.settings.lock().thread_name = name.into();
        Ok(())
    }

    /// Milliseconds the default `on_wait` blocks for.
    pub fn wait_millis(&self) -> i64 {
        self.ctx.wait_millis()
    }

    /// Set the wait time: `0` waits until notified, negative never waits.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` once the daemon has started.
    pub fn set_wait_millis(&self, millis: i64) -> Result<()> {
        self.ctx.check_configurable("wait millis")?;
        self.ctx.settings.lock().wait_millis = millis;
        Ok(())
    }

    /// The lock used for notifications.
    pub fn lock(&self) -> Arc<Monitor> {
        self.ctx.lock()
    }

    /// Share an existing lock, for example with a queue's notifier.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` once the daemon has started.
    pub fn set_lock(&self, lock: Arc<Monitor>) -> Result<()> {
        self.ctx.check_configurable("lock")?;
        self.ctx.settings.lock().lock = lock;
        Ok(())
    }

    /// True if a notification is pending.
    pub fn is_notification(&self) -> bool {
        self.ctx.is_notification()
    }

    /// Set or clear the notification flag, waking the worker when set.
    pub fn set_notification(&self, notify: bool) {
        self.ctx.set_notification(notify)
    }

    /// Deliver a cooperative interrupt to the worker.
    pub fn interrupt(&self) {
        self.ctx.interrupt()
    }

    /// Spawn the worker thread and wait until it is running.
    ///
    /// Does nothing if the daemon is already started.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if the daemon has exited, or if the worker died
    ///   before it reported in
    /// - the error `on_enter` returned
    /// - `Io` if the thread could not be spawned; the daemon may be started
    ///   again
    pub fn start(&self) -> Result<()> {
        self.start_with(thread::Builder::new())
    }

    fn start_with(&self, builder: thread::Builder) -> Result<()> {
        let mut state = self.ctx.state.lock();
        if *state > DaemonState::Initial && *state < DaemonState::Exited {
            return Ok(());
        }
        let Some(handler) = self.handler.lock().take() else {
            return Err(Error::illegal_state("Daemon is not restartable"));
        };

        *self.ctx.start_error.lock() = None;
        let name = self.ctx.thread_name();
        let ctx = Arc::clone(&self.ctx);
        // the worker claims the handler; a failed spawn leaves it here
        let pending = Arc::new(Mutex::new(Some(handler)));
        let claim = Arc::clone(&pending);
        let spawned = builder.name(name.clone()).spawn(move || {
            if let Some(handler) = claim.lock().take() {
                run(ctx, handler);
            }
        });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                *self.handler.lock() = pending.lock().take();
                return Err(err.into());
            }
        };
        *self.ctx.thread.lock() = Some(handle.thread().id());
        self.ctx.advance(&mut state, DaemonState::Starting);

        while *state < DaemonState::Running && !handle.is_finished() {
            self.ctx.state_changed.wait_for(&mut state, START_SLICE);
        }
        let reached = *state;
        drop(state);
        *self.handle.lock() = Some(handle);

        if let Some(err) = self.ctx.start_error.lock().take() {
            return Err(err);
        }
        if reached == DaemonState::Starting {
            return Err(Error::illegal_state(format!(
                "daemon thread start failed: {}",
                name
            )));
        }
        info!(thread = %name, "Daemon started");
        Ok(())
    }

    /// Ask the daemon to stop. Only the first call has an effect.
    pub fn stop(&self) {
        self.ctx.stop()
    }

    /// Wait up to `millis` (0 = forever) for the worker thread to finish.
    ///
    /// Returns `true` if the thread is no longer alive.
    pub fn join(&self, millis: u64) -> bool {
        let deadline = (millis > 0).then(|| Instant::now() + Duration::from_millis(millis));
        let mut slot = self.handle.lock();
        let finished = match slot.as_ref() {
            None => return true,
            Some(handle) => {
                {
                    let mut state = self.ctx.state.lock();
                    while *state != DaemonState::Exited {
                        match deadline {
                            Some(at) => {
                                if self.ctx.state_changed.wait_until(&mut state, at).timed_out() {
                                    break;
                                }
                            }
                            None => self.ctx.state_changed.wait(&mut state),
                        }
                    }
                }
                // Exited is set just before the thread returns
                loop {
                    if handle.is_finished() {
                        break true;
                    }
                    if deadline.map_or(false, |at| Instant::now() >= at) {
                        break false;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        };
        if finished {
            if let Some(handle) = slot.take() {
                if handle.join().is_err() {
                    error!(thread = %self.ctx.thread_name(), "Daemon thread panicked");
                }
            }
        }
        finished
    }
}

impl<H: DaemonHandler> Drop for Daemon<H> {
    fn drop(&mut self) {
        self.ctx.stop();
    }
}

impl<H: DaemonHandler> fmt::Debug for Daemon<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.ctx, f)
    }
}

// ============================================================================
// Worker
// ============================================================================

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "(non-string panic)".to_string())
}

/// Run one hook, turning a panic into an error.
fn guarded<R>(ctx: &DaemonContext, hook: &str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(&*payload);
            error!(thread = %ctx.thread_name(), hook, "Daemon hook panicked: {}", msg);
            Err(Error::illegal_state(format!("{} panicked: {}", hook, msg)))
        }
    }
}

fn on_exception<H: DaemonHandler>(ctx: &DaemonContext, handler: &mut H, err: &Error) {
    let handled = guarded(ctx, "on_exception", || {
        handler.on_exception(ctx, err);
        Ok(())
    });
    if handled.is_err() {
        // the handler cannot cope; end the loop rather than spin on it
        ctx.stop();
    }
}

fn dispatch<H: DaemonHandler>(ctx: &DaemonContext, handler: &mut H, result: Result<()>) {
    let Err(err) = result else {
        return;
    };
    match err.kind() {
        ErrorKind::EventDeath => {}
        ErrorKind::Interrupted => {
            let handled = guarded(ctx, "on_interrupt", || {
                handler.on_interrupt(ctx);
                Ok(())
            });
            if let Err(err) = handled {
                on_exception(ctx, handler, &err);
            }
        }
        _ => on_exception(ctx, handler, &err),
    }
}

fn run<H: DaemonHandler>(ctx: Arc<DaemonContext>, mut handler: H) {
    let expected = {
        // start() records the thread id while holding the state lock
        let _state = ctx.state.lock();
        ctx.is_worker_thread()
    };
    if !expected {
        error!(thread = %ctx.thread_name(), "Daemon is running on an unexpected thread");
        return;
    }

    *ctx.started_at.lock() = Some(Utc::now());
    if let Err(err) = guarded(&ctx, "on_enter", || handler.on_enter(&ctx)) {
        // start() reads the slot once the state moves on; keep it locked
        // until on_exception is done
        let mut slot = ctx.start_error.lock();
        let err = slot.insert(err);
        on_exception(&ctx, &mut handler, err);
    }

    ctx.set_state(DaemonState::Running);

    while !ctx.is_exiting() {
        let result = guarded(&ctx, "on_wait", || {
            handler.on_wait(&ctx)?;
            if !ctx.is_exiting() {
                handler.on_notify(&ctx)?;
            }
            Ok(())
        });
        dispatch(&ctx, &mut handler, result);
    }

    run_finally(&ctx, &mut handler);
}

fn run_finally<H: DaemonHandler>(ctx: &DaemonContext, handler: &mut H) {
    {
        let _exit = ctx.exit_monitor.lock();
        ctx.interrupted.store(false, Ordering::Release);
    }

    if let Err(err) = guarded(ctx, "on_exit", || handler.on_exit(ctx)) {
        on_exception(ctx, handler, &err);
    }

    let mut state = ctx.state.lock();
    *ctx.thread.lock() = None;
    ctx.advance(&mut state, DaemonState::Exited);
    info!(thread = %ctx.thread_name(), "Daemon exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counts {
        entered: AtomicUsize,
        waited: AtomicUsize,
        notified: AtomicUsize,
        interrupted: AtomicUsize,
        exceptions: AtomicUsize,
        exited: AtomicUsize,
    }

    struct Recorder {
        counts: Arc<Counts>,
        fail_on_enter: bool,
    }

    impl Recorder {
        fn new() -> (Self, Arc<Counts>) {
            let counts = Arc::new(Counts::default());
            let recorder = Recorder {
                counts: Arc::clone(&counts),
                fail_on_enter: false,
            };
            (recorder, counts)
        }
    }

    impl DaemonHandler for Recorder {
        fn on_enter(&mut self, _ctx: &DaemonContext) -> Result<()> {
            self.counts.entered.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_enter {
                return Err(Error::illegal_state("Exception On Start"));
            }
            Ok(())
        }

        fn on_wait(&mut self, ctx: &DaemonContext) -> Result<()> {
            self.counts.waited.fetch_add(1, Ordering::SeqCst);
            ctx.wait_for_notification()
        }

        fn on_notify(&mut self, _ctx: &DaemonContext) -> Result<()> {
            self.counts.notified.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_interrupt(&mut self, _ctx: &DaemonContext) {
            self.counts.interrupted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_exception(&mut self, ctx: &DaemonContext, _err: &Error) {
            self.counts.exceptions.fetch_add(1, Ordering::SeqCst);
            ctx.stop();
        }

        fn on_exit(&mut self, _ctx: &DaemonContext) -> Result<()> {
            self.counts.exited.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn eventually(f: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        f()
    }

    #[test]
    fn test_state_ordering() {
        assert!(DaemonState::Initial < DaemonState::Starting);
        assert!(DaemonState::Starting < DaemonState::Running);
        assert!(DaemonState::Running < DaemonState::Exiting);
        assert!(DaemonState::Exiting < DaemonState::Exited);
    }

    #[test]
    fn test_lifecycle() {
        let (recorder, counts) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.set_thread_name("test-lifecycle").unwrap();
        assert_eq!(daemon.state(), DaemonState::Initial);
        assert!(!daemon.is_started());

        daemon.start().unwrap();
        assert_eq!(daemon.state(), DaemonState::Running);
        assert!(daemon.is_started());
        assert_eq!(counts.entered.load(Ordering::SeqCst), 1);
        assert!(daemon.context().start_timestamp().is_some());

        daemon.stop();
        assert!(daemon.state() >= DaemonState::Exiting);
        assert!(daemon.join(0));
        assert_eq!(daemon.state(), DaemonState::Exited);
        assert!(!daemon.is_started());
        assert_eq!(counts.exited.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_is_idempotent() {
        let (recorder, counts) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.start().unwrap();
        daemon.start().unwrap();
        assert_eq!(counts.entered.load(Ordering::SeqCst), 1);
        daemon.stop();
        assert!(daemon.join(0));
    }

    #[test]
    fn test_not_restartable() {
        let (recorder, _) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.start().unwrap();
        daemon.stop();
        assert!(daemon.join(0));

        let err = daemon.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(err.to_string().contains("not restartable"));
        assert_eq!(daemon.state(), DaemonState::Exited);
    }

    #[test]
    fn test_failed_spawn_keeps_handler() {
        let (recorder, counts) = Recorder::new();
        let daemon = Daemon::new(recorder);
        // no address space can hold this stack
        let err = daemon
            .start_with(thread::Builder::new().stack_size(1 << 60))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(daemon.state(), DaemonState::Initial);

        daemon.start().unwrap();
        assert!(eventually(|| counts.entered.load(Ordering::SeqCst) == 1));
        daemon.stop();
        assert!(daemon.join(0));
    }

    #[test]
    fn test_notification_wakes_worker() {
        let (recorder, counts) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.start().unwrap();
        assert!(eventually(|| counts.waited.load(Ordering::SeqCst) >= 1));

        daemon.set_notification(true);
        assert!(eventually(|| counts.notified.load(Ordering::SeqCst) >= 1));
        assert!(eventually(|| !daemon.is_notification()));

        daemon.stop();
        assert!(daemon.join(0));
    }

    #[test]
    fn test_on_enter_error_reaches_start() {
        let (mut recorder, counts) = Recorder::new();
        recorder.fail_on_enter = true;
        let daemon = Daemon::new(recorder);

        let err = daemon.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(err.to_string().contains("Exception On Start"));
        assert_eq!(counts.exceptions.load(Ordering::SeqCst), 1);

        assert!(daemon.join(0));
        assert_eq!(daemon.state(), DaemonState::Exited);
    }

    #[test]
    fn test_interrupt_reaches_on_interrupt() {
        let (recorder, counts) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.start().unwrap();

        daemon.interrupt();
        assert!(eventually(|| counts.interrupted.load(Ordering::SeqCst) == 1));
        assert_eq!(daemon.state(), DaemonState::Running);

        daemon.stop();
        assert!(daemon.join(0));
    }

    #[test]
    fn test_properties_fixed_after_start() {
        let (recorder, _) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.set_wait_millis(5).unwrap();
        daemon.start().unwrap();

        assert_eq!(
            daemon.set_thread_name("late").unwrap_err().kind(),
            ErrorKind::IllegalState
        );
        assert_eq!(
            daemon.set_wait_millis(1).unwrap_err().kind(),
            ErrorKind::IllegalState
        );
        assert_eq!(
            daemon.set_lock(Arc::new(Monitor::new())).unwrap_err().kind(),
            ErrorKind::IllegalState
        );
        assert_eq!(daemon.wait_millis(), 5);

        daemon.stop();
        assert!(daemon.join(0));
    }

    #[test]
    fn test_join_unstarted_daemon() {
        let (recorder, _) = Recorder::new();
        let daemon = Daemon::new(recorder);
        assert!(daemon.join(10));
    }

    #[test]
    fn test_join_times_out_while_running() {
        let (recorder, _) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.start().unwrap();
        assert!(!daemon.join(20));
        daemon.stop();
        assert!(daemon.join(0));
    }

    #[test]
    fn test_describe() {
        let (recorder, _) = Recorder::new();
        let daemon = Daemon::new(recorder);
        daemon.set_thread_name("describe").unwrap();
        let text = daemon.context().to_string();
        assert!(text.contains("State=initial"));
        assert!(text.contains("ThreadName=describe"));
    }

    #[test]
    fn test_sleep_interrupted() {
        let ctx = DaemonContext::new(&DaemonConfig::default());
        ctx.interrupt();
        assert!(!ctx.sleep(1_000));
        assert!(ctx.sleep(1));
    }
}
