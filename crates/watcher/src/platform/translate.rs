//! Translation of raw notify events into event records
//!
//! notify reports renames as separate halves: inotify emits `From`, then
//! `To`, then a combined `Both` when the cookies match; other backends emit
//! the halves only, or a bare `Any` rename. `RenameTracker` pairs the halves
//! so every rename inside the watched tree becomes exactly one `Renamed`
//! record. A `From` that never finds its `To` (the entry left the tree) is
//! reported as `Deleted` as soon as the next unrelated event arrives, the
//! watch is stopped, or it has waited longer than [`RENAME_WINDOW`]; an
//! unpaired `To` (the entry moved in) is `Created`.

use notify::event::{
    CreateKind, DataChange, EventKind as RawKind, MetadataKind, ModifyKind, RemoveKind, RenameMode,
};
use notify::Event;
use relay_core::{EventRecord, NotifyFilters};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long a `From` half may wait for its `To` before it counts as a deletion
pub const RENAME_WINDOW: Duration = Duration::from_millis(100);

/// How long a completed cookie waits for its trailing `Both`
const COMPLETED_RETENTION: Duration = Duration::from_secs(1);

/// A translated record plus the notify filters that let it through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub record: EventRecord,
    pub qualifies: NotifyFilters,
}

impl Change {
    /// Whether the configured notify filter admits this change
    pub fn admitted_by(&self, filter: NotifyFilters) -> bool {
        filter.intersects(self.qualifies)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    File,
    Dir,
    Unknown,
}

impl Entry {
    fn probe(path: &Path) -> Self {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => Entry::Dir,
            Ok(_) => Entry::File,
            Err(_) => Entry::Unknown,
        }
    }

    /// Filter bits that govern name events (create/delete/rename)
    fn name_filter(self) -> NotifyFilters {
        match self {
            Entry::File => NotifyFilters::FILE_NAME,
            Entry::Dir => NotifyFilters::DIRECTORY_NAME,
            Entry::Unknown => NotifyFilters::FILE_NAME | NotifyFilters::DIRECTORY_NAME,
        }
    }
}

/// First half of a rename waiting for its counterpart
#[derive(Debug)]
struct PendingFrom {
    tracker: Option<usize>,
    path: PathBuf,
    since: Instant,
}

/// Stateful translator pairing rename halves
#[derive(Debug, Default)]
pub struct RenameTracker {
    pending: Vec<PendingFrom>,

    /// Cookies whose `To` half already produced a `Renamed`
    completed: HashMap<usize, Instant>,
}

impl RenameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one raw event
    pub fn translate(&mut self, event: Event, root: Option<&Path>) -> Vec<Change> {
        let tracker = event.tracker();
        let mut out = Vec::new();

        match event.kind {
            RawKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => {
                    self.flush_into(&mut out, root);
                    let since = Instant::now();
                    for path in event.paths {
                        self.pending.push(PendingFrom {
                            tracker,
                            path,
                            since,
                        });
                    }
                }
                RenameMode::To => {
                    let matched = self.take_pending(tracker);
                    self.flush_into(&mut out, root);
                    for path in event.paths {
                        match &matched {
                            Some(old) => {
                                if let Some(cookie) = tracker {
                                    self.completed.insert(cookie, Instant::now());
                                }
                                out.push(renamed(&path, old, root));
                            }
                            None => {
                                let entry = Entry::probe(&path);
                                out.push(name_change(EventRecord::created(&path, name_of(&path, root)), entry));
                            }
                        }
                    }
                }
                RenameMode::Both => {
                    if let Some(cookie) = tracker {
                        if self.completed.remove(&cookie).is_some() {
                            return out;
                        }
                        self.take_pending(Some(cookie));
                    }
                    self.flush_into(&mut out, root);
                    if let [old, new, ..] = event.paths.as_slice() {
                        out.push(renamed(new, old, root));
                    }
                }
                RenameMode::Any | RenameMode::Other => {
                    self.flush_into(&mut out, root);
                    for path in event.paths {
                        let entry = Entry::probe(&path);
                        let name = name_of(&path, root);
                        let record = match entry {
                            Entry::Unknown => EventRecord::deleted(&path, name),
                            _ => EventRecord::created(&path, name),
                        };
                        out.push(name_change(record, entry));
                    }
                }
            },
            kind => {
                self.flush_into(&mut out, root);
                for path in event.paths {
                    if let Some(change) = translate_plain(kind, &path, root) {
                        out.push(change);
                    }
                }
            }
        }

        out
    }

    /// Report every unpaired `From` as a deletion
    pub fn flush(&mut self, root: Option<&Path>) -> Vec<Change> {
        let mut out = Vec::new();
        self.flush_into(&mut out, root);
        self.completed.clear();
        out
    }

    /// Report `From` halves older than `max_age` as deletions
    ///
    /// Also forgets completed cookies whose trailing `Both` never came.
    pub fn expire(&mut self, max_age: Duration, root: Option<&Path>) -> Vec<Change> {
        let now = Instant::now();
        let mut out = Vec::new();

        let (expired, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| now.saturating_duration_since(p.since) >= max_age);
        self.pending = waiting;
        for from in expired {
            out.push(moved_out(from, root));
        }

        self.completed
            .retain(|_, at| now.saturating_duration_since(*at) < COMPLETED_RETENTION);
        out
    }

    /// Number of rename halves still waiting
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn take_pending(&mut self, tracker: Option<usize>) -> Option<PathBuf> {
        let index = self.pending.iter().rposition(|p| p.tracker == tracker)?;
        Some(self.pending.remove(index).path)
    }

    fn flush_into(&mut self, out: &mut Vec<Change>, root: Option<&Path>) {
        for from in self.pending.drain(..) {
            out.push(moved_out(from, root));
        }
    }
}

fn moved_out(from: PendingFrom, root: Option<&Path>) -> Change {
    let name = name_of(&from.path, root);
    name_change(EventRecord::deleted(from.path, name), Entry::Unknown)
}

fn translate_plain(kind: RawKind, path: &Path, root: Option<&Path>) -> Option<Change> {
    let name = name_of(path, root);
    let change = match kind {
        RawKind::Create(create) => {
            let entry = match create {
                CreateKind::File => Entry::File,
                CreateKind::Folder => Entry::Dir,
                _ => Entry::probe(path),
            };
            name_change(EventRecord::created(path, name), entry)
        }
        RawKind::Remove(remove) => {
            let entry = match remove {
                RemoveKind::File => Entry::File,
                RemoveKind::Folder => Entry::Dir,
                _ => Entry::Unknown,
            };
            name_change(EventRecord::deleted(path, name), entry)
        }
        RawKind::Modify(modify) => Change {
            record: EventRecord::changed(path, name),
            qualifies: modify_filter(modify),
        },
        RawKind::Access(_) => Change {
            record: EventRecord::changed(path, name),
            qualifies: NotifyFilters::LAST_ACCESS,
        },
        RawKind::Any => Change {
            record: EventRecord::changed(path, name),
            qualifies: unknown_change(),
        },
        RawKind::Other => return None,
    };
    Some(change)
}

/// Which notify filter a modification falls under
fn modify_filter(modify: ModifyKind) -> NotifyFilters {
    match modify {
        ModifyKind::Data(DataChange::Size) => NotifyFilters::SIZE,
        ModifyKind::Data(_) => NotifyFilters::LAST_WRITE,
        ModifyKind::Metadata(MetadataKind::WriteTime) => NotifyFilters::LAST_WRITE,
        ModifyKind::Metadata(MetadataKind::AccessTime) => NotifyFilters::LAST_ACCESS,
        ModifyKind::Metadata(MetadataKind::Permissions | MetadataKind::Ownership) => {
            NotifyFilters::SECURITY
        }
        ModifyKind::Metadata(_) => NotifyFilters::ATTRIBUTES,
        ModifyKind::Name(_) => NotifyFilters::FILE_NAME | NotifyFilters::DIRECTORY_NAME,
        ModifyKind::Any | ModifyKind::Other => unknown_change(),
    }
}

fn unknown_change() -> NotifyFilters {
    NotifyFilters::SIZE | NotifyFilters::LAST_WRITE | NotifyFilters::ATTRIBUTES
}

fn name_change(record: EventRecord, entry: Entry) -> Change {
    Change {
        record,
        qualifies: entry.name_filter(),
    }
}

fn renamed(new: &Path, old: &Path, root: Option<&Path>) -> Change {
    let entry = Entry::probe(new);
    name_change(
        EventRecord::renamed(new, name_of(new, root), old, name_of(old, root)),
        entry,
    )
}

/// Name of an entry relative to the watched root
///
/// Falls back to the file name for paths outside the root.
pub fn name_of(path: &Path, root: Option<&Path>) -> String {
    if let Some(relative) = root.and_then(|root| path.strip_prefix(root).ok()) {
        if !relative.as_os_str().is_empty() {
            return relative.to_string_lossy().into_owned();
        }
    }

    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
