//! Producer/consumer queues with batched notification.
//!
//! [`ConcurrentQueue`] carries the behavior every queue shares: an atomic
//! element count, the flush state machine and the blocking removal loop.
//! [`DualQueue`] is the concrete implementation.
//!
//! ## Flush state
//!
//! ```text
//!             first insert into an empty queue
//!   +---------------------------------------------+
//!   v                                             |
//! Pending --(every batch_size-th insert)--> Auto  |
//!   |                                             |
//!   +---------------(flush())----------> Explicit +
//! ```
//!
//! The notifier is signalled on the Pending to Auto transition and on every
//! explicit `flush()`. With a batch size above one, a producer that stops
//! short of a batch boundary must call `flush()` to wake the consumer.
//!
//! ## DualQueue locking
//!
//! Producers append to the tail under the tail lock; the consumer pops from
//! the head under the head lock. When the head runs dry the consumer takes
//! the tail lock and then the head lock and swaps the two lists. The head
//! lock is never held while taking the tail lock.

use crate::monitor::Monitor;
use gridwire_core::{Error, QueueConfig, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// Polling interval for waits on a queue without a notifier.
const POLL: Duration = Duration::from_millis(1);

// ============================================================================
// FlushState
// ============================================================================

/// Whether the consumer still needs to be told about queued elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlushState {
    /// Elements were added since the queue was last empty; a flush is due
    Pending = 0,
    /// Flushed automatically on reaching the batch size
    Auto = 1,
    /// Flushed by an explicit `flush()` call
    Explicit = 2,
}

impl FlushState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => FlushState::Pending,
            1 => FlushState::Auto,
            _ => FlushState::Explicit,
        }
    }
}

// ============================================================================
// QueueCore
// ============================================================================

/// Counting, flush and statistics state shared by queue implementations.
#[derive(Debug)]
pub struct QueueCore {
    count: AtomicUsize,
    flush_state: AtomicU8,
    batch_size: AtomicUsize,
    notifier: RwLock<Option<Arc<Monitor>>>,
    stats_emptied: AtomicU64,
    stats_flushed: AtomicU64,
}

impl QueueCore {
    /// Create state with its own notifier.
    pub fn new(batch_size: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            flush_state: AtomicU8::new(FlushState::Explicit as u8),
            batch_size: AtomicUsize::new(batch_size.max(1)),
            notifier: RwLock::new(Some(Arc::new(Monitor::new()))),
            stats_emptied: AtomicU64::new(0),
            stats_flushed: AtomicU64::new(0),
        }
    }

    /// Record one insert. Call while holding the lock of the list the
    /// element went into; returns the new element count.
    pub fn record_add(&self) -> usize {
        let n = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        if n == 1 {
            self.flush_state
                .store(FlushState::Pending as u8, Ordering::Release);
        }
        n
    }

    /// Notify the consumer if this insert completes a batch.
    ///
    /// Call after the list lock is released.
    pub fn check_flush(&self, count: usize) {
        if self.flush_state() != FlushState::Pending {
            return;
        }
        let batch = self.batch_size();
        if batch == 1 || count % batch == 0 {
            self.flush_auto();
        }
    }

    /// Record one removal.
    pub fn record_remove(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.on_empty();
        }
    }

    fn on_empty(&self) {
        self.stats_emptied.fetch_add(1, Ordering::Relaxed);
    }

    fn flush_auto(&self) {
        let swapped = self.flush_state.compare_exchange(
            FlushState::Pending as u8,
            FlushState::Auto as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if swapped.is_ok() {
            trace!(size = self.size(), "Queue auto flush");
            self.notify();
        }
    }

    fn flush_explicit(&self) {
        self.flush_state
            .store(FlushState::Explicit as u8, Ordering::Release);
        trace!(size = self.size(), "Queue explicit flush");
        self.notify();
    }

    fn notify(&self) {
        self.stats_flushed.fetch_add(1, Ordering::Relaxed);
        if let Some(notifier) = self.notifier() {
            notifier.signal_all();
        }
    }

    fn size(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn flush_state(&self) -> FlushState {
        FlushState::from_u8(self.flush_state.load(Ordering::Acquire))
    }

    fn batch_size(&self) -> usize {
        self.batch_size.load(Ordering::Relaxed)
    }

    fn notifier(&self) -> Option<Arc<Monitor>> {
        self.notifier.read().clone()
    }
}

// ============================================================================
// ConcurrentQueue
// ============================================================================

/// A thread-safe FIFO queue with batched consumer notification.
///
/// Implementors supply the list operations and a [`QueueCore`]; the rest
/// of the surface is provided.
pub trait ConcurrentQueue<T>: Send + Sync {
    /// Shared counting and flush state.
    fn core(&self) -> &QueueCore;

    /// Append an element at the tail.
    fn add(&self, item: T);

    /// Insert an element so it is the next one removed.
    fn add_head(&self, item: T);

    /// Remove the next element if there is one.
    fn remove_no_wait(&self) -> Option<T>;

    /// Clone the next element without removing it.
    fn peek_no_wait(&self) -> Option<T>
    where
        T: Clone;

    /// Remove the next element, blocking until one is available.
    fn remove(&self) -> T {
        loop {
            if let Some(item) = self.remove_no_wait() {
                return item;
            }
            self.wait_for_entry(0);
        }
    }

    /// Remove the next element, waiting up to `millis` for one to arrive.
    ///
    /// `0` returns at once like [`remove_no_wait`](Self::remove_no_wait).
    fn remove_timeout(&self, millis: u64) -> Option<T> {
        let deadline = Instant::now() + Duration::from_millis(millis);
        loop {
            if let Some(item) = self.remove_no_wait() {
                return Some(item);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let left = (deadline - now).as_millis().max(1) as i64;
            self.wait_for_entry(left);
        }
    }

    /// Wait until the queue may hold an element.
    ///
    /// `millis == 0` waits until notified. The element may already be gone
    /// by the time this returns.
    fn wait_for_entry(&self, millis: i64) {
        let Some(notifier) = self.core().notifier() else {
            if self.is_empty() {
                thread::sleep(POLL);
            }
            return;
        };
        let mut guard = notifier.lock();
        if self.is_empty() {
            notifier.wait_millis(&mut guard, millis);
        }
    }

    /// Wake the consumer regardless of the batch size.
    fn flush(&self) {
        self.core().flush_explicit();
    }

    /// Number of elements. Lock free.
    fn size(&self) -> usize {
        self.core().size()
    }

    /// True if the queue holds no elements.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Current flush state.
    fn flush_state(&self) -> FlushState {
        self.core().flush_state()
    }

    /// True if elements are waiting for a flush.
    fn is_flush_pending(&self) -> bool {
        self.flush_state() == FlushState::Pending
    }

    /// Number of inserts between automatic notifications.
    fn batch_size(&self) -> usize {
        self.core().batch_size()
    }

    /// Set the number of inserts between automatic notifications.
    ///
    /// # Errors
    ///
    /// Returns `IllegalArgument` if `batch` is zero.
    fn set_batch_size(&self, batch: usize) -> Result<()> {
        if batch == 0 {
            return Err(Error::illegal_argument("batch size must be at least 1"));
        }
        self.core().batch_size.store(batch, Ordering::Relaxed);
        Ok(())
    }

    /// The monitor signalled on flush, if any.
    fn notifier(&self) -> Option<Arc<Monitor>> {
        self.core().notifier()
    }

    /// Replace the notifier; `None` disables notification. Should not be
    /// changed while the queue is in use.
    fn set_notifier(&self, notifier: Option<Arc<Monitor>>) {
        *self.core().notifier.write() = notifier;
    }

    /// Number of times the queue became empty.
    fn stats_emptied(&self) -> u64 {
        self.core().stats_emptied.load(Ordering::Relaxed)
    }

    /// Number of times the consumer was notified.
    fn stats_flushed(&self) -> u64 {
        self.core().stats_flushed.load(Ordering::Relaxed)
    }

    /// Zero the statistics.
    fn reset_stats(&self) {
        self.core().stats_emptied.store(0, Ordering::Relaxed);
        self.core().stats_flushed.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// DualQueue
// ============================================================================

/// A queue split into a tail for producers and a head for the consumer.
///
/// Elements added with [`add`](ConcurrentQueue::add) come out in insertion
/// order. [`add_head`](ConcurrentQueue::add_head) jumps the line.
///
/// # Example
///
/// ```
/// use gridwire_concurrency::{ConcurrentQueue, DualQueue};
///
/// let queue = DualQueue::new();
/// queue.add(1);
/// queue.add(2);
/// queue.add_head(0);
/// assert_eq!(queue.remove_no_wait(), Some(0));
/// assert_eq!(queue.remove_no_wait(), Some(1));
/// assert_eq!(queue.size(), 1);
/// ```
#[derive(Debug)]
pub struct DualQueue<T> {
    /// Producer side; also the queue's own lock.
    tail: Mutex<VecDeque<T>>,
    /// Consumer side. Never held while taking `tail`.
    head: Mutex<VecDeque<T>>,
    core: QueueCore,
}

impl<T: Send> DualQueue<T> {
    /// Create an empty queue with a batch size of one.
    pub fn new() -> Self {
        Self::from_config(&QueueConfig::default())
    }

    /// Create an empty queue with the batch size from `config`.
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            tail: Mutex::new(VecDeque::new()),
            head: Mutex::new(VecDeque::new()),
            core: QueueCore::new(config.batch_size),
        }
    }

    /// Move the tail into the head if the head is empty, then apply `f`
    /// to the head. Takes the locks in tail, head order.
    fn with_swapped_head<R>(&self, f: impl FnOnce(&mut VecDeque<T>) -> R) -> R {
        let mut tail = self.tail.lock();
        let mut head = self.head.lock();
        if head.is_empty() {
            std::mem::swap(&mut *head, &mut *tail);
        }
        f(&mut head)
    }
}

impl<T: Send> Default for DualQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentQueue<T> for DualQueue<T> {
    fn core(&self) -> &QueueCore {
        &self.core
    }

    fn add(&self, item: T) {
        let count = {
            let mut tail = self.tail.lock();
            tail.push_back(item);
            self.core.record_add()
        };
        self.core.check_flush(count);
    }

    fn add_head(&self, item: T) {
        let count = {
            let mut head = self.head.lock();
            head.push_front(item);
            self.core.record_add()
        };
        self.core.check_flush(count);
    }

    fn remove_no_wait(&self) -> Option<T> {
        let fast = self.head.lock().pop_front();
        let item = match fast {
            Some(item) => Some(item),
            None => self.with_swapped_head(|head| head.pop_front()),
        };
        if item.is_some() {
            self.core.record_remove();
        }
        item
    }

    fn peek_no_wait(&self) -> Option<T>
    where
        T: Clone,
    {
        if let Some(item) = self.head.lock().front() {
            return Some(item.clone());
        }
        self.with_swapped_head(|head| head.front().cloned())
    }
}
