//! Watcher options
//!
//! Serializable description of what a watcher observes. Loaded from the
//! `[watch]` table of a config file or built in code, then turned into a
//! [`FileWatcherBuilder`](crate::FileWatcherBuilder).

use crate::error::{Result, WatchError};
use crate::filter::NameFilter;
use relay_core::{NotifyFilters, WatcherKinds};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What to watch and which notifications to raise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Enabled notification kinds (default: created, deleted, changed, renamed)
    #[serde(default)]
    pub kinds: WatcherKinds,

    /// Directory to watch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Glob patterns matched against file names (default: everything)
    #[serde(default)]
    pub filters: Vec<String>,

    /// Attributes whose change counts (default: file_name, directory_name, last_write)
    #[serde(default)]
    pub notify_filter: NotifyFilters,

    /// Watch the whole tree below `path` (default: false)
    #[serde(default)]
    pub include_subdirectories: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            kinds: WatcherKinds::default(),
            path: None,
            filters: vec![],
            notify_filter: NotifyFilters::default(),
            include_subdirectories: false,
        }
    }
}

impl WatchOptions {
    /// Options for `path` with the given kinds and defaults elsewhere
    pub fn new(kinds: WatcherKinds, path: impl Into<PathBuf>) -> Self {
        Self {
            kinds,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Check the options describe a usable watcher
    pub fn validate(&self) -> Result<()> {
        if self.kinds.is_empty() {
            return Err(WatchError::Config(
                "at least one notification kind must be enabled".to_string(),
            ));
        }

        if let Some(path) = &self.path {
            if !path.is_dir() {
                return Err(WatchError::Config(format!(
                    "path {} is not a directory",
                    path.display()
                )));
            }
        } else if self.kinds.has_live() {
            return Err(WatchError::MissingPath);
        }

        if self.notify_filter.is_empty() && self.kinds.has_live() {
            return Err(WatchError::Config(
                "notify_filter is empty, no live notification could be raised".to_string(),
            ));
        }

        NameFilter::new(&self.filters)?;
        Ok(())
    }
}
