//! Error types for the watcher
//!
//! Usage errors (`Disposed`, `MissingPath`, ...) are returned synchronously
//! from the call that caused them. Native-layer and handler failures never
//! reach a caller; they are delivered to the error sink instead.

use relay_core::EventRecord;
use std::path::PathBuf;

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Operation on a watcher that has been disposed
    #[error("watcher has been disposed")]
    Disposed,

    /// Native notifications requested without a directory to watch
    #[error("no path configured for live notifications")]
    MissingPath,

    /// No tokio runtime to run drains on
    #[error("no tokio runtime available; build the watcher inside a runtime or pass a handle")]
    NoRuntime,

    /// Error raised by the native watch primitive
    #[error("native watcher error: {0}")]
    Native(#[from] notify::Error),

    /// The native event buffer overflowed; changes may have been missed
    #[error("native event buffer overflowed{}", .path.as_ref().map(|p| format!(" under {}", p.display())).unwrap_or_default())]
    Overflow { path: Option<PathBuf> },

    /// Enumerating pre-existing files failed
    #[error("failed to enumerate {}: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A filter pattern could not be compiled
    #[error("invalid filter pattern: {0}")]
    InvalidFilter(#[from] ignore::Error),

    /// The event handler returned an error
    #[error("handler failed for {record}: {source:#}")]
    Handler {
        record: EventRecord,
        #[source]
        source: anyhow::Error,
    },

    /// The event handler panicked
    #[error("handler panicked for {record}: {message}")]
    HandlerPanicked { record: EventRecord, message: String },

    /// Invalid watcher options
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl WatchError {
    /// The record being handled when the error occurred, if any
    pub fn record(&self) -> Option<&EventRecord> {
        match self {
            WatchError::Handler { record, .. } | WatchError::HandlerPanicked { record, .. } => {
                Some(record)
            }
            _ => None,
        }
    }

    /// Whether this is a caller usage error rather than a runtime failure
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            WatchError::Disposed | WatchError::MissingPath | WatchError::NoRuntime | WatchError::Config(_)
        )
    }
}
