//! Event records flowing from the native watcher to the user handler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of change carried by an [`EventRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// File was already present when watching started
    Existed,

    /// File or directory created
    Created,

    /// File or directory deleted
    Deleted,

    /// File or directory changed (content, size, attributes, ...)
    Changed,

    /// File or directory renamed
    Renamed,
}

impl EventKind {
    /// Lowercase label used in logs and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Existed => "existed",
            EventKind::Created => "created",
            EventKind::Deleted => "deleted",
            EventKind::Changed => "changed",
            EventKind::Renamed => "renamed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported file-system change
///
/// Records are immutable once built. `old_full_path` and `old_name` are only
/// populated for [`EventKind::Renamed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    kind: EventKind,
    full_path: PathBuf,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_full_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_name: Option<String>,
}

impl EventRecord {
    /// Create a record of any kind without rename information
    pub fn new(kind: EventKind, full_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            kind,
            full_path: full_path.into(),
            name: name.into(),
            old_full_path: None,
            old_name: None,
        }
    }

    /// Record for a file found by the startup snapshot
    pub fn existed(full_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::new(EventKind::Existed, full_path, name)
    }

    pub fn created(full_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::new(EventKind::Created, full_path, name)
    }

    pub fn deleted(full_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::new(EventKind::Deleted, full_path, name)
    }

    pub fn changed(full_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::new(EventKind::Changed, full_path, name)
    }

    /// Record for a rename, carrying both the new and the previous location
    pub fn renamed(
        full_path: impl Into<PathBuf>,
        name: impl Into<String>,
        old_full_path: impl Into<PathBuf>,
        old_name: impl Into<String>,
    ) -> Self {
        Self::new(EventKind::Renamed, full_path, name).with_old(old_full_path, old_name)
    }

    /// Attach the previous location of a renamed entry
    pub fn with_old(mut self, old_full_path: impl Into<PathBuf>, old_name: impl Into<String>) -> Self {
        self.old_full_path = Some(old_full_path.into());
        self.old_name = Some(old_name.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Absolute (or watcher-root based) path of the entry
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// Name of the entry relative to the watched directory
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn old_full_path(&self) -> Option<&Path> {
        self.old_full_path.as_deref()
    }

    pub fn old_name(&self) -> Option<&str> {
        self.old_name.as_deref()
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old_full_path {
            Some(old) => write!(
                f,
                "{} {} -> {}",
                self.kind,
                old.display(),
                self.full_path.display()
            ),
            None => write!(f, "{} {}", self.kind, self.full_path.display()),
        }
    }
}
