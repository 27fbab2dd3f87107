//! Name filters for watched entries
//!
//! Filters are glob patterns (`*.txt`, `report-??.csv`) matched against the
//! entry's file name. Several patterns combine with "any matches". An empty
//! set, `*` or `*.*` match everything.

use crate::error::Result;
use ignore::overrides::{Override, OverrideBuilder};
use std::path::Path;

/// Compiled set of filter patterns
#[derive(Clone)]
pub struct NameFilter {
    /// Patterns as given by the caller
    patterns: Vec<String>,

    /// Compiled whitelist, `None` when everything matches
    matcher: Option<Override>,
}

impl NameFilter {
    /// Compile a list of patterns
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if patterns.is_empty() || patterns.iter().any(|p| is_match_all(p)) {
            return Ok(Self {
                patterns,
                matcher: None,
            });
        }

        let mut builder = OverrideBuilder::new(".");
        builder.case_insensitive(cfg!(windows))?;
        for pattern in &patterns {
            builder.add(pattern)?;
        }

        Ok(Self {
            patterns,
            matcher: Some(builder.build()?),
        })
    }

    /// Filter that accepts every name
    pub fn all() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: None,
        }
    }

    /// Check whether a path's file name passes the filter
    pub fn matches(&self, path: &Path) -> bool {
        let Some(matcher) = &self.matcher else {
            return true;
        };

        match path.file_name() {
            Some(name) => matcher.matched(Path::new(name), false).is_whitelist(),
            None => false,
        }
    }

    /// Patterns as configured
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches_everything(&self) -> bool {
        self.matcher.is_none()
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl std::fmt::Debug for NameFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameFilter")
            .field("patterns", &self.patterns)
            .finish()
    }
}

fn is_match_all(pattern: &str) -> bool {
    pattern == "*" || pattern == "*.*"
}
