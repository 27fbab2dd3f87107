//! Unbounded FIFO holding area between producers and the drain
//!
//! Producers are native callback threads and `retry` callers; the single
//! consumer is whichever drain currently owns the catcher. Backed by an
//! unbounded crossbeam channel whose sender and receiver both live here, so
//! `push` can never observe a disconnected channel.

use crossbeam_channel::{unbounded, Receiver, Sender};
use relay_core::EventRecord;

/// Thread-safe, unbounded, insertion-ordered event queue
pub struct EventQueue {
    tx: Sender<EventRecord>,
    rx: Receiver<EventRecord>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append a record (never blocks)
    pub fn push(&self, record: EventRecord) {
        // The receiver is owned by `self`, so the channel is never disconnected.
        let _ = self.tx.send(record);
    }

    /// Take the oldest record, if any (never blocks)
    pub fn try_pop(&self) -> Option<EventRecord> {
        self.rx.try_recv().ok()
    }

    /// Drop every queued record, returning how many were discarded
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Number of records waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
