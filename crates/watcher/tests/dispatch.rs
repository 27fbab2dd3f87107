//! Ordering and delivery guarantees of the dispatcher, driven through retry

mod common;

use async_trait::async_trait;
use common::{runtime, Recorder, TIMEOUT};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use watcher::{EventHandler, EventKind, EventRecord, FileWatcher, WatchError, WatcherKinds};

fn record(name: &str) -> EventRecord {
    EventRecord::changed(format!("/w/{name}"), name)
}

#[test]
fn test_records_delivered_in_queue_order() {
    let rt = runtime();
    let recorder = Recorder::default();
    let watcher = recorder
        .install(FileWatcher::builder(WatcherKinds::CHANGED).runtime(rt.handle().clone()))
        .build()
        .unwrap();

    let expected: Vec<String> = (0..200).map(|i| format!("f{i}")).collect();
    for name in &expected {
        watcher.retry(record(name)).unwrap();
    }

    assert!(watcher.wait_drained(TIMEOUT));
    assert_eq!(recorder.names(), expected);
    assert_eq!(watcher.stats().delivered, 200);
    watcher.dispose().unwrap();
}

#[test]
fn test_no_loss_under_concurrent_producers() {
    let rt = runtime();
    let recorder = Recorder::default();
    let watcher = Arc::new(
        recorder
            .install(FileWatcher::builder(WatcherKinds::CHANGED).runtime(rt.handle().clone()))
            .build()
            .unwrap(),
    );

    let producers: Vec<_> = (0..8)
        .map(|t| {
            let watcher = Arc::clone(&watcher);
            std::thread::spawn(move || {
                for i in 0..100 {
                    watcher.retry(record(&format!("t{t}-{i}"))).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let records = recorder.wait_for(800);
    assert_eq!(records.len(), 800);

    // Each producer's records keep their relative order
    let mut last: HashMap<String, usize> = HashMap::new();
    for record in &records {
        let (thread, index) = record.name().split_once('-').unwrap();
        let index: usize = index.parse().unwrap();
        if let Some(previous) = last.insert(thread.to_string(), index) {
            assert!(previous < index, "{thread}: {previous} before {index}");
        }
    }
}

/// Handler that tracks how many invocations overlap
#[derive(Clone, Default)]
struct Overlap {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    handled: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for Overlap {
    async fn handle(&self, _record: EventRecord) -> anyhow::Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_single_handler_invocation_at_a_time() {
    let rt = runtime();
    let overlap = Overlap::default();
    let watcher = Arc::new(
        FileWatcher::builder(WatcherKinds::CHANGED)
            .runtime(rt.handle().clone())
            .on_event(overlap.clone())
            .build()
            .unwrap(),
    );

    let producers: Vec<_> = (0..4)
        .map(|t| {
            let watcher = Arc::clone(&watcher);
            std::thread::spawn(move || {
                for i in 0..50 {
                    watcher.retry(record(&format!("{t}-{i}"))).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(watcher.wait_drained(TIMEOUT));
    assert_eq!(overlap.handled.load(Ordering::SeqCst), 200);
    assert_eq!(overlap.max_active.load(Ordering::SeqCst), 1);
}

/// Retries the first record it sees once the gate opens
#[derive(Clone)]
struct RetryOnce {
    watcher: Arc<Mutex<Weak<FileWatcher>>>,
    gate: Arc<Notify>,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EventHandler for RetryOnce {
    async fn handle(&self, record: EventRecord) -> anyhow::Result<()> {
        let first = {
            let mut seen = self.seen.lock();
            seen.push(record.name().to_string());
            seen.len() == 1
        };
        if first {
            self.gate.notified().await;
            if let Some(watcher) = self.watcher.lock().upgrade() {
                watcher.retry(record)?;
            }
        }
        Ok(())
    }
}

#[test]
fn test_retry_goes_to_the_tail() {
    let rt = runtime();
    let handler = RetryOnce {
        watcher: Arc::new(Mutex::new(Weak::new())),
        gate: Arc::new(Notify::new()),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let watcher = Arc::new(
        FileWatcher::builder(WatcherKinds::CHANGED)
            .runtime(rt.handle().clone())
            .on_event(handler.clone())
            .build()
            .unwrap(),
    );
    *handler.watcher.lock() = Arc::downgrade(&watcher);

    watcher.retry(record("a")).unwrap();
    watcher.retry(record("b")).unwrap();
    handler.gate.notify_one();

    let deadline = std::time::Instant::now() + TIMEOUT;
    while handler.seen.lock().len() < 3 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(*handler.seen.lock(), vec!["a", "b", "a"]);
}

#[test]
fn test_handler_failures_are_reported_and_draining_continues() {
    let rt = runtime();
    let handled = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&handled);
    let error_sink = Arc::clone(&errors);
    let watcher = FileWatcher::builder(WatcherKinds::CHANGED)
        .runtime(rt.handle().clone())
        .on_event(move |record: EventRecord| {
            let sink = Arc::clone(&sink);
            async move {
                match record.name() {
                    "bad" => anyhow::bail!("cannot process"),
                    "boom" => panic!("handler blew up"),
                    name => sink.lock().push(name.to_string()),
                }
                Ok(())
            }
        })
        .on_error(move |err: &WatchError| {
            let kind = match err {
                WatchError::Handler { .. } => "error",
                WatchError::HandlerPanicked { .. } => "panic",
                _ => "other",
            };
            let name = err.record().map(|r| r.name().to_string()).unwrap_or_default();
            error_sink.lock().push(format!("{kind}:{name}"));
        })
        .build()
        .unwrap();

    for name in ["first", "bad", "boom", "last"] {
        watcher.retry(record(name)).unwrap();
    }

    assert!(watcher.wait_drained(TIMEOUT));
    assert_eq!(*handled.lock(), vec!["first", "last"]);
    assert_eq!(*errors.lock(), vec!["error:bad", "panic:boom"]);

    let stats = watcher.stats();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.failed, 2);
}

#[test]
fn test_dispose_waits_for_in_flight_handler() {
    let rt = runtime();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let handled = Arc::new(AtomicUsize::new(0));

    let active = Arc::clone(&in_flight);
    let count = Arc::clone(&handled);
    let watcher = FileWatcher::builder(WatcherKinds::CHANGED)
        .runtime(rt.handle().clone())
        .on_event(move |_record: EventRecord| {
            let active = Arc::clone(&active);
            let count = Arc::clone(&count);
            async move {
                active.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                count.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        })
        .build()
        .unwrap();

    for i in 0..20 {
        watcher.retry(record(&format!("f{i}"))).unwrap();
    }
    std::thread::sleep(Duration::from_millis(60));

    watcher.dispose().unwrap();
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    assert!(!watcher.is_dispatching());
    assert_eq!(watcher.pending(), 0);

    // Nothing is handled after dispose returned
    let after = handled.load(Ordering::SeqCst);
    assert!(after < 20);
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(handled.load(Ordering::SeqCst), after);
}

#[test]
fn test_dispose_from_async_context() {
    let rt = runtime();
    let recorder = Recorder::default();
    let watcher = Arc::new(
        recorder
            .install(FileWatcher::builder(WatcherKinds::CHANGED).runtime(rt.handle().clone()))
            .build()
            .unwrap(),
    );

    rt.block_on(async {
        watcher.retry(record("a")).unwrap();
        let blocking = Arc::clone(&watcher);
        tokio::task::spawn_blocking(move || blocking.dispose())
            .await
            .unwrap()
            .unwrap();
    });

    assert!(matches!(
        watcher.retry(EventRecord::new(EventKind::Created, "/w/b", "b")),
        Err(WatchError::Disposed)
    ));
}
