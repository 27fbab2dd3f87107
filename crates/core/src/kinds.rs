//! Notification flag sets
//!
//! `WatcherKinds` selects which event kinds a watcher raises, `NotifyFilters`
//! selects which file attributes count as a change. Both parse from and
//! serialize to lists of lowercase names (`["created", "deleted"]`) so they
//! can live in TOML configuration and on the command line.

use crate::record::EventKind;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Kinds of notification a watcher raises
    ///
    /// `EXISTED` is the lowest bit, so any value above it includes a live kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WatcherKinds: u32 {
        const EXISTED = 1 << 0;
        const CREATED = 1 << 1;
        const DELETED = 1 << 2;
        const CHANGED = 1 << 3;
        const RENAMED = 1 << 4;
    }
}

impl WatcherKinds {
    /// Kinds that require native notifications (everything but `EXISTED`)
    pub fn live(self) -> Self {
        self.difference(Self::EXISTED)
    }

    /// Whether native notifications need to be enabled at all
    pub fn has_live(self) -> bool {
        !self.live().is_empty()
    }

    /// Flag matching a single event kind
    pub fn for_kind(kind: EventKind) -> Self {
        match kind {
            EventKind::Existed => Self::EXISTED,
            EventKind::Created => Self::CREATED,
            EventKind::Deleted => Self::DELETED,
            EventKind::Changed => Self::CHANGED,
            EventKind::Renamed => Self::RENAMED,
        }
    }

    /// Whether records of `kind` are raised
    pub fn allows(self, kind: EventKind) -> bool {
        self.contains(Self::for_kind(kind))
    }
}

impl Default for WatcherKinds {
    /// All live kinds, no startup snapshot
    fn default() -> Self {
        Self::all().live()
    }
}

bitflags! {
    /// File attributes whose change is reported
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NotifyFilters: u32 {
        const FILE_NAME = 1 << 0;
        const DIRECTORY_NAME = 1 << 1;
        const ATTRIBUTES = 1 << 2;
        const SIZE = 1 << 3;
        const LAST_WRITE = 1 << 4;
        const LAST_ACCESS = 1 << 5;
        const CREATION_TIME = 1 << 6;
        const SECURITY = 1 << 7;
    }
}

impl Default for NotifyFilters {
    fn default() -> Self {
        Self::FILE_NAME | Self::DIRECTORY_NAME | Self::LAST_WRITE
    }
}

/// Unknown flag name in a list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {set} name: '{name}'")]
pub struct ParseFlagsError {
    set: &'static str,
    name: String,
}

impl ParseFlagsError {
    /// The name that failed to parse
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagNames {
    List(Vec<String>),
    Joined(String),
}

/// Name-based parsing, display and serde for a bitflags set
macro_rules! named_flags {
    ($ty:ident, $label:literal) => {
        impl $ty {
            /// Lowercase names of the flags set
            pub fn names(self) -> Vec<String> {
                self.iter_names()
                    .map(|(name, _)| name.to_ascii_lowercase())
                    .collect()
            }

            fn parse_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, ParseFlagsError> {
                let mut flags = Self::empty();
                for raw in names {
                    let name = raw.trim();
                    if name.is_empty() {
                        continue;
                    }
                    if name.eq_ignore_ascii_case("all") {
                        flags |= Self::all();
                        continue;
                    }
                    let canonical = name.to_ascii_uppercase().replace('-', "_");
                    match Self::from_name(&canonical) {
                        Some(flag) => flags |= flag,
                        None => {
                            return Err(ParseFlagsError {
                                set: $label,
                                name: name.to_string(),
                            })
                        }
                    }
                }
                Ok(flags)
            }
        }

        impl FromStr for $ty {
            type Err = ParseFlagsError;

            /// Parse `"created, deleted"` or `"created|deleted"`
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_names(s.split([',', '|']))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.names().join(","))
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_seq(self.names())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match FlagNames::deserialize(deserializer)? {
                    FlagNames::List(names) => {
                        Self::parse_names(names.iter().map(String::as_str))
                    }
                    FlagNames::Joined(joined) => joined.parse(),
                }
                .map_err(serde::de::Error::custom)
            }
        }
    };
}

named_flags!(WatcherKinds, "watcher kind");
named_flags!(NotifyFilters, "notify filter");
