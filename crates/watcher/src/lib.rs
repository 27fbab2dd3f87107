//! Coalescing file-system watcher
//!
//! Bridges native change notifications, raised on threads owned by the OS
//! layer, into one ordered stream consumed by a single async handler:
//! - Unbounded FIFO queue; producers never block
//! - Single-flight drain: handler N+1 starts only after handler N finished
//! - Optional snapshot of pre-existing files ahead of live notifications
//! - Lifecycle gating and quiescence on dispose

pub mod catcher;
pub mod config;
pub mod error;
pub mod filter;
pub mod handler;
pub mod platform;
pub mod queue;
pub mod snapshot;

pub use catcher::DispatchStatsSnapshot;
pub use config::WatchOptions;
pub use error::{Result, WatchError};
pub use filter::NameFilter;
pub use handler::{ErrorHandler, EventHandler};
pub use relay_core::{EventKind, EventRecord, NotifyFilters, WatcherKinds};

use catcher::Catcher;
use handler::ErrorSink;
use parking_lot::{Mutex, RwLock};
use platform::translate::{name_of, Change, RenameTracker, RENAME_WINDOW};
use platform::NativeWatcher;
use queue::EventQueue;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Where a watcher is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, never started
    Idle,

    /// Raising notifications
    Watching,

    /// Notifications suspended; `start` resumes
    Stopped,

    /// Torn down for good
    Disposed,
}

/// Mutable watch settings shared with the notification callback
#[derive(Debug)]
struct Settings {
    path: Option<PathBuf>,
    filter: NameFilter,
    notify_filter: NotifyFilters,
    include_subdirectories: bool,
}

/// Intake side: turns raw notifications into queued records
struct Adapter {
    kinds: WatcherKinds,
    queue: Arc<EventQueue>,
    catcher: Arc<Catcher>,
    errors: Arc<ErrorSink>,
    settings: RwLock<Settings>,

    /// Raw notifications are only accepted while set
    raising: AtomicBool,

    renames: Mutex<RenameTracker>,
}

impl Adapter {
    /// Native callback. Runs on notify's threads and never blocks on the
    /// handler.
    fn on_raw(&self, res: notify::Result<notify::Event>) {
        if !self.raising.load(Ordering::SeqCst) {
            return;
        }

        let event = match res {
            Ok(event) => event,
            Err(err) => {
                self.errors.report(&WatchError::Native(err));
                return;
            }
        };

        if event.need_rescan() {
            self.errors.report(&WatchError::Overflow {
                path: event.paths.first().cloned(),
            });
            return;
        }

        let settings = self.settings.read();
        let changes = self
            .renames
            .lock()
            .translate(event, settings.path.as_deref());
        let pushed = self.enqueue(&settings, changes);
        drop(settings);

        if pushed > 0 {
            self.catcher.trigger();
        }
    }

    /// Queue the changes the watcher is configured to report
    fn enqueue(&self, settings: &Settings, changes: Vec<Change>) -> usize {
        let mut pushed = 0;
        for change in changes {
            if !self.admits(settings, &change) {
                trace!("Filtered {}", change.record);
                continue;
            }
            trace!("Queued {}", change.record);
            self.queue.push(change.record);
            pushed += 1;
        }
        pushed
    }

    fn admits(&self, settings: &Settings, change: &Change) -> bool {
        let record = &change.record;
        if !self.kinds.allows(record.kind()) || !change.admitted_by(settings.notify_filter) {
            return false;
        }

        settings.filter.matches(record.full_path())
            || record
                .old_full_path()
                .is_some_and(|old| settings.filter.matches(old))
    }

    /// Report rename halves that never found their partner
    fn flush_renames(&self) {
        let settings = self.settings.read();
        let changes = self.renames.lock().flush(settings.path.as_deref());
        let pushed = self.enqueue(&settings, changes);
        drop(settings);

        if pushed > 0 {
            self.catcher.trigger();
        }
    }

    /// Report rename halves that waited too long for their partner
    fn expire_renames(&self) {
        if !self.raising.load(Ordering::SeqCst) {
            return;
        }

        let settings = self.settings.read();
        let changes = self
            .renames
            .lock()
            .expire(RENAME_WINDOW, settings.path.as_deref());
        let pushed = self.enqueue(&settings, changes);
        drop(settings);

        if pushed > 0 {
            self.catcher.trigger();
        }
    }

    fn submit(&self, record: EventRecord) {
        trace!("Queued {}", record);
        self.queue.push(record);
        self.catcher.trigger();
    }
}

/// Periodically settle rename halves while the watcher is alive
///
/// Holds only a weak reference so a dropped watcher ends the task.
fn spawn_rename_sweeper(adapter: &Arc<Adapter>) -> JoinHandle<()> {
    let runtime = adapter.catcher.runtime().clone();
    let adapter = Arc::downgrade(adapter);

    runtime.spawn(async move {
        let mut ticks = interval_at(Instant::now() + RENAME_WINDOW, RENAME_WINDOW);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let Some(adapter) = adapter.upgrade() else {
                break;
            };
            adapter.expire_renames();
        }
    })
}

/// Lifecycle state plus the native watcher it controls
struct Control {
    state: LifecycleState,
    native: Option<NativeWatcher>,

    /// Settles stale rename halves while watching
    sweeper: Option<JoinHandle<()>>,
}

/// Watches one directory and feeds its changes to a single handler, in order
///
/// Built with [`FileWatcher::builder`]. Dropping the watcher without calling
/// [`dispose`](Self::dispose) stops notifications and discards queued
/// records without waiting for an in-flight handler.
pub struct FileWatcher {
    adapter: Arc<Adapter>,
    control: Mutex<Control>,
    disposed: AtomicBool,
}

impl FileWatcher {
    /// Start building a watcher raising the given kinds
    pub fn builder(kinds: WatcherKinds) -> FileWatcherBuilder {
        FileWatcherBuilder::new(kinds)
    }

    /// Watcher for `path` with name filters and no handler yet
    ///
    /// Must be called inside a tokio runtime.
    pub fn new<S: AsRef<str>>(
        kinds: WatcherKinds,
        path: impl Into<PathBuf>,
        filters: &[S],
    ) -> Result<Self> {
        Self::builder(kinds)
            .path(path)
            .filters(filters.iter().map(|f| f.as_ref().to_string()))
            .build()
    }

    /// Builder seeded from loaded options
    pub fn from_options(options: WatchOptions) -> FileWatcherBuilder {
        FileWatcherBuilder::from(options)
    }

    /// Begin raising notifications
    ///
    /// With `EXISTED` enabled, files already under the path are queued ahead
    /// of any live notification. Nothing is queued unless the native watch
    /// was armed, so a failed start can simply be retried. A no-op while
    /// watching.
    pub fn start(&self) -> Result<()> {
        let mut control = self.control.lock();
        match control.state {
            LifecycleState::Disposed => return Err(WatchError::Disposed),
            LifecycleState::Watching => return Ok(()),
            LifecycleState::Idle | LifecycleState::Stopped => {}
        }

        let kinds = self.adapter.kinds;
        let (path, recursive, filter) = {
            let settings = self.adapter.settings.read();
            (
                settings.path.clone(),
                settings.include_subdirectories,
                settings.filter.clone(),
            )
        };

        if kinds.has_live() && path.is_none() {
            return Err(WatchError::MissingPath);
        }

        let existing = match &path {
            Some(root) if kinds.contains(WatcherKinds::EXISTED) => {
                self.collect_snapshot(root, recursive, &filter)?
            }
            _ => Vec::new(),
        };

        if let (true, Some(root)) = (kinds.has_live(), &path) {
            if control.native.is_none() {
                control.native = Some(self.native_watcher()?);
            }
            if let Some(native) = control.native.as_mut() {
                native.arm(root, recursive)?;
            }
        }

        // Snapshot records go in before the intake opens
        self.publish_snapshot(existing);
        if kinds.has_live() {
            self.adapter.raising.store(true, Ordering::SeqCst);
            if let Some(stale) = control.sweeper.replace(spawn_rename_sweeper(&self.adapter)) {
                stale.abort();
            }
        }

        control.state = LifecycleState::Watching;
        debug!("Watching {:?} for {}", path, kinds);
        Ok(())
    }

    /// Suspend notifications
    ///
    /// Records already queued are still delivered. A no-op once stopped.
    pub fn stop(&self) -> Result<()> {
        let mut control = self.control.lock();
        match control.state {
            LifecycleState::Disposed => Err(WatchError::Disposed),
            LifecycleState::Stopped => Ok(()),
            LifecycleState::Idle | LifecycleState::Watching => {
                self.halt(&mut control);
                Ok(())
            }
        }
    }

    /// Tear down for good
    ///
    /// Blocks until an in-flight handler invocation has returned, then drops
    /// whatever is still queued. Must not be called from a thread the handler
    /// depends on; async callers go through `spawn_blocking`.
    pub fn dispose(&self) -> Result<()> {
        {
            let mut control = self.control.lock();
            if control.state == LifecycleState::Disposed {
                return Err(WatchError::Disposed);
            }
            if control.state != LifecycleState::Stopped {
                self.halt(&mut control);
            }
            self.disposed.store(true, Ordering::SeqCst);
            control.native = None;
            control.state = LifecycleState::Disposed;
        }

        let catcher = &self.adapter.catcher;
        catcher.detach();
        catcher.wait_idle();

        let dropped = self.adapter.queue.clear();
        self.adapter.errors.clear();
        debug!("Watcher disposed, {} queued records dropped", dropped);
        Ok(())
    }

    /// Queue a record again, behind everything already queued
    pub fn retry(&self, record: EventRecord) -> Result<()> {
        self.ensure_alive()?;
        self.adapter.submit(record);
        Ok(())
    }

    /// Field-wise [`retry`](Self::retry)
    ///
    /// A missing `old_name` is derived from `old_full_path`.
    pub fn retry_with(
        &self,
        kind: EventKind,
        full_path: impl Into<PathBuf>,
        name: impl Into<String>,
        old_full_path: Option<PathBuf>,
        old_name: Option<String>,
    ) -> Result<()> {
        let record = EventRecord::new(kind, full_path, name);
        let record = match old_full_path {
            Some(old) => {
                let old_name = old_name.unwrap_or_else(|| name_of(&old, None));
                record.with_old(old, old_name)
            }
            None => record,
        };
        self.retry(record)
    }

    /// Replace the event handler
    pub fn set_handler(&self, handler: impl EventHandler) -> Result<()> {
        self.ensure_alive()?;
        self.adapter.catcher.attach(Arc::new(handler));
        Ok(())
    }

    /// Replace the error callback
    pub fn set_error_handler<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.ensure_alive()?;
        self.adapter.errors.set(Arc::new(callback));
        Ok(())
    }

    /// Watch a different directory; re-arms immediately while watching
    pub fn set_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let mut control = self.control.lock();
        if control.state == LifecycleState::Disposed {
            return Err(WatchError::Disposed);
        }

        self.adapter.settings.write().path = Some(path);
        self.rearm(&mut control)
    }

    /// Replace the name filters
    pub fn set_filters<S: AsRef<str>>(&self, patterns: &[S]) -> Result<()> {
        self.ensure_alive()?;
        let filter = NameFilter::new(patterns)?;
        self.adapter.settings.write().filter = filter;
        Ok(())
    }

    /// Add one name filter to the existing set
    pub fn add_filter(&self, pattern: &str) -> Result<()> {
        self.ensure_alive()?;
        let mut settings = self.adapter.settings.write();
        let mut patterns = settings.filter.patterns().to_vec();
        patterns.push(pattern.to_string());
        settings.filter = NameFilter::new(&patterns)?;
        Ok(())
    }

    pub fn set_notify_filter(&self, notify_filter: NotifyFilters) -> Result<()> {
        self.ensure_alive()?;
        self.adapter.settings.write().notify_filter = notify_filter;
        Ok(())
    }

    /// Watch the whole tree or just the top level; re-arms while watching
    pub fn set_include_subdirectories(&self, include: bool) -> Result<()> {
        let mut control = self.control.lock();
        if control.state == LifecycleState::Disposed {
            return Err(WatchError::Disposed);
        }

        self.adapter.settings.write().include_subdirectories = include;
        self.rearm(&mut control)
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.adapter.settings.read().path.clone()
    }

    pub fn filters(&self) -> Vec<String> {
        self.adapter.settings.read().filter.patterns().to_vec()
    }

    pub fn notify_filter(&self) -> NotifyFilters {
        self.adapter.settings.read().notify_filter
    }

    pub fn include_subdirectories(&self) -> bool {
        self.adapter.settings.read().include_subdirectories
    }

    pub fn kinds(&self) -> WatcherKinds {
        self.adapter.kinds
    }

    pub fn state(&self) -> LifecycleState {
        self.control.lock().state
    }

    /// Records queued and not yet handed to the handler
    pub fn pending(&self) -> usize {
        self.adapter.queue.len()
    }

    /// Whether a drain is delivering records right now
    pub fn is_dispatching(&self) -> bool {
        self.adapter.catcher.is_running()
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.adapter.catcher.stats()
    }

    /// Block until queued records have been delivered
    ///
    /// Returns `false` if the queue did not drain within `timeout`.
    pub fn wait_drained(&self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if !self.adapter.catcher.wait_idle_timeout(remaining) {
                return false;
            }
            if self.adapter.queue.is_empty() || self.adapter.catcher.is_detached() {
                return true;
            }
            if remaining.is_zero() {
                return false;
            }
            std::thread::yield_now();
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(WatchError::Disposed)
        } else {
            Ok(())
        }
    }

    fn native_watcher(&self) -> Result<NativeWatcher> {
        let adapter = Arc::clone(&self.adapter);
        NativeWatcher::new(move |res| adapter.on_raw(res))
    }

    /// Enumerate pre-existing files without queuing them yet
    fn collect_snapshot(
        &self,
        root: &Path,
        recursive: bool,
        filter: &NameFilter,
    ) -> Result<Vec<EventRecord>> {
        let errors = &self.adapter.errors;
        let mut records = Vec::new();
        snapshot::scan(
            root,
            recursive,
            filter,
            |record| records.push(record),
            |err| errors.report(&err),
        )?;
        Ok(records)
    }

    fn publish_snapshot(&self, records: Vec<EventRecord>) {
        if records.is_empty() {
            return;
        }
        for record in records {
            self.adapter.queue.push(record);
        }
        self.adapter.catcher.trigger();
    }

    /// Stop raising, release the native watch and settle pending renames
    fn halt(&self, control: &mut Control) {
        self.adapter.raising.store(false, Ordering::SeqCst);
        if let Some(sweeper) = control.sweeper.take() {
            sweeper.abort();
        }
        if let Some(native) = control.native.as_mut() {
            if let Err(err) = native.disarm() {
                self.adapter.errors.report(&err);
            }
        }
        self.adapter.flush_renames();
        control.state = LifecycleState::Stopped;
        debug!("Watcher stopped");
    }

    /// Point an armed native watch at the current settings
    ///
    /// If arming fails the watcher falls back to `Stopped` so that `start`
    /// can be retried.
    fn rearm(&self, control: &mut Control) -> Result<()> {
        if control.state != LifecycleState::Watching {
            return Ok(());
        }

        let (path, recursive) = {
            let settings = self.adapter.settings.read();
            (settings.path.clone(), settings.include_subdirectories)
        };
        let (Some(native), Some(path)) = (control.native.as_mut(), path) else {
            return Ok(());
        };

        self.adapter.flush_renames();
        if let Err(err) = native.arm(&path, recursive) {
            self.adapter.raising.store(false, Ordering::SeqCst);
            if let Some(sweeper) = control.sweeper.take() {
                sweeper.abort();
            }
            control.state = LifecycleState::Stopped;
            return Err(err);
        }
        Ok(())
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        self.adapter.raising.store(false, Ordering::SeqCst);
        let control = self.control.get_mut();
        control.native = None;
        if let Some(sweeper) = control.sweeper.take() {
            sweeper.abort();
        }
        self.adapter.catcher.detach();
        self.adapter.queue.clear();
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("kinds", &self.adapter.kinds)
            .field("settings", &*self.adapter.settings.read())
            .field("pending", &self.adapter.queue.len())
            .finish()
    }
}

/// Builder for [`FileWatcher`]
pub struct FileWatcherBuilder {
    kinds: WatcherKinds,
    path: Option<PathBuf>,
    filters: Vec<String>,
    notify_filter: NotifyFilters,
    include_subdirectories: bool,
    handler: Option<Arc<dyn EventHandler>>,
    on_error: Option<ErrorHandler>,
    runtime: Option<Handle>,
}

impl FileWatcherBuilder {
    fn new(kinds: WatcherKinds) -> Self {
        Self {
            kinds,
            path: None,
            filters: Vec::new(),
            notify_filter: NotifyFilters::default(),
            include_subdirectories: false,
            handler: None,
            on_error: None,
            runtime: None,
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a name filter such as `*.txt`
    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filters.push(pattern.into());
        self
    }

    pub fn filters<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn notify_filter(mut self, notify_filter: NotifyFilters) -> Self {
        self.notify_filter = notify_filter;
        self
    }

    pub fn include_subdirectories(mut self, include: bool) -> Self {
        self.include_subdirectories = include;
        self
    }

    /// Handler receiving every record, one at a time
    pub fn on_event(mut self, handler: impl EventHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Callback for native and handler failures (default: `tracing::warn!`)
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WatchError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Runtime the handler runs on (default: the current one); it needs the
    /// time driver enabled
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<FileWatcher> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| WatchError::NoRuntime)?,
        };
        let filter = NameFilter::new(&self.filters)?;

        let queue = Arc::new(EventQueue::new());
        let errors = Arc::new(ErrorSink::new(self.on_error));
        let catcher = Arc::new(Catcher::new(
            Arc::clone(&queue),
            self.handler,
            Arc::clone(&errors),
            runtime,
        ));

        let adapter = Adapter {
            kinds: self.kinds,
            queue,
            catcher,
            errors,
            settings: RwLock::new(Settings {
                path: self.path,
                filter,
                notify_filter: self.notify_filter,
                include_subdirectories: self.include_subdirectories,
            }),
            raising: AtomicBool::new(false),
            renames: Mutex::new(RenameTracker::new()),
        };

        Ok(FileWatcher {
            adapter: Arc::new(adapter),
            control: Mutex::new(Control {
                state: LifecycleState::Idle,
                native: None,
                sweeper: None,
            }),
            disposed: AtomicBool::new(false),
        })
    }
}

impl From<WatchOptions> for FileWatcherBuilder {
    fn from(options: WatchOptions) -> Self {
        let mut builder = Self::new(options.kinds)
            .filters(options.filters)
            .notify_filter(options.notify_filter)
            .include_subdirectories(options.include_subdirectories);
        builder.path = options.path;
        builder
    }
}
