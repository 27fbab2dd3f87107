//! Native watch primitive
//!
//! Wraps notify's recommended watcher (inotify on Linux, FSEvents on macOS,
//! ReadDirectoryChangesW on Windows). The callback runs on threads owned by
//! notify; it must never block.

pub mod translate;

use crate::error::Result;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory currently armed on the native watcher
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    path: PathBuf,
    recursive: bool,
}

/// Owned native watcher plus the target it is armed on
pub struct NativeWatcher {
    inner: RecommendedWatcher,
    armed: Option<Target>,
}

impl NativeWatcher {
    /// Create the native watcher; nothing is watched until [`arm`](Self::arm)
    pub fn new<F>(callback: F) -> Result<Self>
    where
        F: FnMut(notify::Result<Event>) + Send + 'static,
    {
        let inner = notify::recommended_watcher(callback)?;
        Ok(Self { inner, armed: None })
    }

    /// Start delivering notifications for `path`
    ///
    /// Re-arming on a different target releases the previous one first. A
    /// previous target that can no longer be released (its directory is gone)
    /// does not block the new one.
    pub fn arm(&mut self, path: &Path, recursive: bool) -> Result<()> {
        let target = Target {
            path: path.to_path_buf(),
            recursive,
        };
        if self.armed.as_ref() == Some(&target) {
            return Ok(());
        }

        if let Err(err) = self.disarm() {
            debug!("Previous native watch already gone: {}", err);
        }

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.inner.watch(path, mode)?;
        debug!("Native watch armed on {} ({:?})", path.display(), mode);

        self.armed = Some(target);
        Ok(())
    }

    /// Stop delivering notifications
    ///
    /// The target is forgotten even if the native unwatch fails (e.g. the
    /// directory was removed, which already dropped the OS watch).
    pub fn disarm(&mut self) -> Result<()> {
        let Some(target) = self.armed.take() else {
            return Ok(());
        };

        self.inner.unwatch(&target.path)?;
        debug!("Native watch released on {}", target.path.display());
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Path the watcher is armed on
    pub fn armed_path(&self) -> Option<&Path> {
        self.armed.as_ref().map(|t| t.path.as_path())
    }
}
