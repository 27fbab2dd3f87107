//! Core data model for relaywatch
//!
//! This crate provides:
//! - `EventRecord`: one reported file-system change (or pre-existing file)
//! - `EventKind`: the tag carried by every record
//! - `WatcherKinds`: which kinds of notification a watcher raises
//! - `NotifyFilters`: which file attributes count as a change

pub mod kinds;
pub mod record;

// Re-exports
pub use kinds::{NotifyFilters, ParseFlagsError, WatcherKinds};
pub use record::{EventKind, EventRecord};
