//! Common utilities for integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use watcher::{EventRecord, FileWatcherBuilder, WatchError};

/// Upper bound for anything that waits on the file system
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// Collects handled records and reported errors
#[derive(Clone, Default)]
pub struct Recorder {
    pub records: Arc<Mutex<Vec<EventRecord>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Attach the recorder as event and error handler
    pub fn install(&self, builder: FileWatcherBuilder) -> FileWatcherBuilder {
        let records = Arc::clone(&self.records);
        let errors = Arc::clone(&self.errors);
        builder
            .on_event(move |record: EventRecord| {
                let records = Arc::clone(&records);
                async move {
                    records.lock().push(record);
                    anyhow::Ok(())
                }
            })
            .on_error(move |err: &WatchError| errors.lock().push(err.to_string()))
    }

    /// Wait until at least `count` records arrived, returning them
    pub fn wait_for(&self, count: usize) -> Vec<EventRecord> {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            {
                let records = self.records.lock();
                if records.len() >= count || Instant::now() >= deadline {
                    return records.clone();
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Records matching a predicate, once at least `count` of them arrived
    pub fn wait_matching<P>(&self, count: usize, predicate: P) -> Vec<EventRecord>
    where
        P: Fn(&EventRecord) -> bool,
    {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let matching: Vec<_> = self
                .records
                .lock()
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect();
            if matching.len() >= count || Instant::now() >= deadline {
                return matching;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }
}

/// Give the native layer time to deliver anything still in flight
pub fn settle() {
    std::thread::sleep(Duration::from_millis(300));
}
