//! A daemon that drains a [`DualQueue`].
//!
//! Producers call [`QueueProcessor::add`] from any thread. The worker
//! sleeps on the daemon's lock, which doubles as the queue's notifier, and
//! hands each element to the processing function in order. Elements still
//! queued when the processor stops are drained before the thread exits.

use crate::daemon::{Daemon, DaemonContext, DaemonHandler, DaemonState};
use crate::queue::{ConcurrentQueue, DualQueue};
use gridwire_core::{DaemonConfig, Error, GridwireConfig, QueueConfig, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

type ProcessFn<T> = Box<dyn FnMut(T) -> Result<()> + Send>;

struct Dispatcher<T> {
    queue: Arc<DualQueue<T>>,
    process: ProcessFn<T>,
    processed: Arc<AtomicU64>,
}

impl<T: Send + 'static> Dispatcher<T> {
    fn drain(&mut self) -> Result<()> {
        while let Some(item) = self.queue.remove_no_wait() {
            self.processed.fetch_add(1, Ordering::Relaxed);
            (self.process)(item)?;
        }
        Ok(())
    }
}

impl<T: Send + 'static> DaemonHandler for Dispatcher<T> {
    fn on_wait(&mut self, ctx: &DaemonContext) -> Result<()> {
        let queue = &self.queue;
        ctx.wait_for_notification_while(|| queue.is_empty())
    }

    fn on_notify(&mut self, _ctx: &DaemonContext) -> Result<()> {
        self.drain()
    }

    fn on_exception(&mut self, ctx: &DaemonContext, err: &Error) {
        // one bad element must not take the processor down
        if !ctx.is_exiting() {
            warn!(thread = %ctx.thread_name(), error = %err, "Queue processor caught an error and is continuing");
        }
    }

    fn on_exit(&mut self, _ctx: &DaemonContext) -> Result<()> {
        self.drain()
    }
}

/// A [`DualQueue`] with a dedicated daemon consuming it.
///
/// # Example
///
/// ```
/// use gridwire_concurrency::QueueProcessor;
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel();
/// let processor = QueueProcessor::new("events", move |n: u32| {
///     tx.send(n * 2).ok();
///     Ok(())
/// });
/// processor.start().unwrap();
/// processor.add(21);
/// assert_eq!(rx.recv().unwrap(), 42);
/// processor.stop();
/// assert!(processor.join(0));
/// ```
pub struct QueueProcessor<T: Send + 'static> {
    queue: Arc<DualQueue<T>>,
    daemon: Daemon<Dispatcher<T>>,
    processed: Arc<AtomicU64>,
}

impl<T: Send + 'static> QueueProcessor<T> {
    /// Create a processor whose worker thread is called `thread_name`.
    pub fn new(
        thread_name: impl Into<String>,
        process: impl FnMut(T) -> Result<()> + Send + 'static,
    ) -> Self {
        let daemon = DaemonConfig {
            thread_name: thread_name.into(),
            ..DaemonConfig::default()
        };
        Self::build(&daemon, &QueueConfig::default(), Box::new(process))
    }

    /// Create a processor with daemon and queue settings from `config`.
    pub fn from_config(
        config: &GridwireConfig,
        process: impl FnMut(T) -> Result<()> + Send + 'static,
    ) -> Self {
        Self::build(&config.daemon, &config.queue, Box::new(process))
    }

    fn build(daemon: &DaemonConfig, queue: &QueueConfig, process: ProcessFn<T>) -> Self {
        let queue = Arc::new(DualQueue::from_config(queue));
        let processed = Arc::new(AtomicU64::new(0));
        let dispatcher = Dispatcher {
            queue: Arc::clone(&queue),
            process,
            processed: Arc::clone(&processed),
        };
        let daemon = Daemon::from_config(dispatcher, daemon);
        queue.set_notifier(Some(daemon.lock()));
        Self {
            queue,
            daemon,
            processed,
        }
    }

    /// The queue the worker drains.
    pub fn queue(&self) -> &Arc<DualQueue<T>> {
        &self.queue
    }

    /// Enqueue an element for processing.
    pub fn add(&self, item: T) {
        self.queue.add(item)
    }

    /// Enqueue an element ahead of everything already queued.
    pub fn add_head(&self, item: T) {
        self.queue.add_head(item)
    }

    /// Wake the worker even if the current batch is incomplete.
    pub fn flush(&self) {
        self.queue.flush()
    }

    /// Number of elements handed to the processing function so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// See [`Daemon::start`].
    pub fn start(&self) -> Result<()> {
        self.daemon.start()
    }

    /// Stop the worker; queued elements are still processed.
    pub fn stop(&self) {
        self.daemon.stop()
    }

    /// Wait up to `millis` (0 = forever) for the worker to finish.
    pub fn join(&self, millis: u64) -> bool {
        self.daemon.join(millis)
    }

    /// Lifecycle state of the worker.
    pub fn state(&self) -> DaemonState {
        self.daemon.state()
    }

    /// True between `start` and the end of the exit sequence.
    pub fn is_started(&self) -> bool {
        self.daemon.is_started()
    }
}
