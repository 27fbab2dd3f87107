//! Startup snapshot of pre-existing files
//!
//! Enumerates the files already present under the watched directory so they
//! flow through the same handler as live events, as `Existed` records. An
//! `Existed` record is named by the bare file name, even when it was found
//! in a subdirectory; the full path locates it.
//! Entries are visited in file-name order within each directory so repeated
//! snapshots of an unchanged tree produce the same sequence.

use crate::error::{Result, WatchError};
use crate::filter::NameFilter;
use relay_core::EventRecord;
use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Walk `root` and hand one `Existed` record per matching file to `emit`
///
/// Fails only if `root` itself cannot be read. Errors on entries below the
/// root are passed to `on_error` and the walk continues. Returns the number
/// of records emitted.
pub fn scan<E, F>(
    root: &Path,
    recursive: bool,
    filter: &NameFilter,
    mut emit: E,
    mut on_error: F,
) -> Result<usize>
where
    E: FnMut(EventRecord),
    F: FnMut(WatchError),
{
    let metadata = std::fs::metadata(root).map_err(|source| WatchError::Snapshot {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(WatchError::Snapshot {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut count = 0;

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                if err.depth() == 0 {
                    return Err(WatchError::Snapshot {
                        path,
                        source: err.into(),
                    });
                }
                on_error(WatchError::Snapshot {
                    path,
                    source: err.into(),
                });
                continue;
            }
        };

        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file || !filter.matches(entry.path()) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        emit(EventRecord::existed(entry.path(), name));
        count += 1;
    }

    debug!("Snapshot of {} found {} files", root.display(), count);
    Ok(count)
}
