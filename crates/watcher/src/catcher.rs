//! Single-flight dispatcher
//!
//! Decouples "an event became available" (cheap, frequent, any thread) from
//! "drain the queue into the handler" (slow, must never overlap itself).
//!
//! `trigger()` starts a drain only when none is running; otherwise it costs a
//! single failed compare-and-swap. A drain pops records one at a time and
//! awaits the handler for each before popping the next. When the queue looks
//! empty the drain clears the running flag, re-checks the queue and tries to
//! take the flag back, all under the idle lock, so a push whose trigger lost
//! the race against the closing drain is still picked up.

use crate::error::WatchError;
use crate::handler::{ErrorSink, EventHandler};
use crate::queue::EventQueue;
use futures::FutureExt;
use parking_lot::{Condvar, Mutex, RwLock};
use relay_core::EventRecord;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Dispatcher counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Records handed to the handler that completed successfully
    delivered: AtomicU64,

    /// Records whose handler failed or panicked
    failed: AtomicU64,

    /// Records popped while no handler was attached
    discarded: AtomicU64,

    /// Drains started
    drains: AtomicU64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub delivered: u64,
    pub failed: u64,
    pub discarded: u64,
    pub drains: u64,
}

/// Coalescing trigger plus the drain it starts
pub struct Catcher {
    queue: Arc<EventQueue>,
    handler: RwLock<Option<Arc<dyn EventHandler>>>,
    errors: Arc<ErrorSink>,
    runtime: Handle,

    /// A drain owns the queue
    running: AtomicBool,

    /// Set once on disposal; no drain starts or continues afterwards
    detached: AtomicBool,

    /// Guards running-flag release so waiters cannot miss the wakeup
    idle_lock: Mutex<()>,
    idle: Condvar,

    stats: DispatchStats,
}

impl Catcher {
    pub fn new(
        queue: Arc<EventQueue>,
        handler: Option<Arc<dyn EventHandler>>,
        errors: Arc<ErrorSink>,
        runtime: Handle,
    ) -> Self {
        Self {
            queue,
            handler: RwLock::new(handler),
            errors,
            runtime,
            running: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Signal that records may be waiting
    ///
    /// Starts exactly one drain if none is running; a no-op otherwise. Never
    /// blocks.
    pub fn trigger(self: &Arc<Self>) {
        if self.detached.load(Ordering::SeqCst) {
            return;
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        // Detach may have raced us between the check and the swap.
        if self.detached.load(Ordering::SeqCst) {
            self.release();
            return;
        }

        self.stats.drains.fetch_add(1, Ordering::Relaxed);
        let lease = DrainLease {
            catcher: Arc::clone(self),
            armed: true,
        };
        self.runtime.spawn(lease.run());
    }

    /// Whether a drain currently owns the queue
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block the calling thread until no drain is running
    ///
    /// Must not be called from a thread the drain itself needs to make
    /// progress (e.g. the only worker of a current-thread runtime).
    pub fn wait_idle(&self) {
        let mut guard = self.idle_lock.lock();
        while self.running.load(Ordering::SeqCst) {
            self.idle.wait(&mut guard);
        }
    }

    /// Like [`wait_idle`](Self::wait_idle) with an upper bound; returns
    /// whether the dispatcher went idle in time
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.idle_lock.lock();
        while self.running.load(Ordering::SeqCst) {
            if self.idle.wait_until(&mut guard, deadline).timed_out() {
                return !self.running.load(Ordering::SeqCst);
            }
        }
        true
    }

    /// Replace the event handler
    pub fn attach(&self, handler: Arc<dyn EventHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Stop dispatching: drop the handler and make triggers no-ops
    ///
    /// A handler invocation already in flight runs to completion; the drain
    /// exits right after it.
    pub fn detach(&self) {
        {
            let _guard = self.idle_lock.lock();
            self.detached.store(true, Ordering::SeqCst);
        }
        self.handler.write().take();
    }

    /// Runtime drains are spawned on
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Clear the running flag and wake quiescence waiters
    fn release(&self) {
        let _guard = self.idle_lock.lock();
        self.running.store(false, Ordering::SeqCst);
        self.idle.notify_all();
    }

    /// Close-or-continue step run when the queue looked empty
    ///
    /// Clearing the flag and re-checking the queue happen under the idle lock.
    /// Returns `true` if this drain re-acquired the flag and must keep going.
    fn finish_or_continue(&self) -> bool {
        let _guard = self.idle_lock.lock();
        self.running.store(false, Ordering::SeqCst);

        let keep_going = !self.detached.load(Ordering::SeqCst)
            && !self.queue.is_empty()
            && self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();

        if !keep_going {
            self.idle.notify_all();
        }
        keep_going
    }

    /// Hand one record to the handler, catching failures at this boundary
    async fn deliver(&self, record: EventRecord) {
        let handler = self.handler.read().clone();
        let Some(handler) = handler else {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            debug!("No handler attached, discarding {}", record);
            return;
        };

        trace!("Dispatching {}", record);
        let outcome = AssertUnwindSafe(handler.handle(record.clone()))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(source)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.errors.report(&WatchError::Handler { record, source });
            }
            Err(payload) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.errors.report(&WatchError::HandlerPanicked {
                    record,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }
}

/// Ownership of the running flag for one drain
///
/// If the drain future is dropped without finishing (runtime shutdown), the
/// flag is released on drop so quiescence waiters are not stranded.
struct DrainLease {
    catcher: Arc<Catcher>,
    armed: bool,
}

impl DrainLease {
    async fn run(mut self) {
        let catcher = Arc::clone(&self.catcher);
        debug!("Drain started ({} queued)", catcher.queue.len());

        loop {
            while !catcher.is_detached() {
                let Some(record) = catcher.queue.try_pop() else {
                    break;
                };
                catcher.deliver(record).await;
            }

            if !catcher.finish_or_continue() {
                break;
            }
        }

        self.armed = false;
        debug!("Drain finished");
    }
}

impl Drop for DrainLease {
    fn drop(&mut self) {
        if self.armed {
            self.catcher.release();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
