//! List pre-existing files through the dispatcher

use crate::config;
use crate::output::Printer;
use crate::SelectArgs;
use anyhow::{Context, Result};
use relay_core::{EventRecord, WatcherKinds};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use watcher::{FileWatcher, WatchError};

/// Upper bound for printing a snapshot
const DRAIN_TIMEOUT: Duration = Duration::from_secs(300);

pub async fn run(config_path: Option<&Path>, path: Option<PathBuf>, select: SelectArgs) -> Result<()> {
    let (config, _) = config::load(config_path)?;
    let printer = Printer::new(select.json || config.output.json, config.output.color);

    let mut options = config.watch;
    options.kinds = WatcherKinds::EXISTED;
    if let Some(path) = path {
        options.path = Some(path);
    }
    if !select.filters.is_empty() {
        options.filters = select.filters;
    }
    if select.recursive {
        options.include_subdirectories = true;
    }

    let root = options
        .path
        .clone()
        .context("No directory to list (pass PATH or set watch.path)")?;
    options.validate().context("Invalid snapshot configuration")?;

    let watcher = Arc::new(
        FileWatcher::from_options(options)
            .on_event(move |record: EventRecord| async move {
                printer.record(&record);
                anyhow::Ok(())
            })
            .on_error(move |err: &WatchError| printer.error(err))
            .build()
            .context("Failed to create watcher")?,
    );

    watcher
        .start()
        .with_context(|| format!("Failed to list {}", root.display()))?;

    let blocking = Arc::clone(&watcher);
    let drained = tokio::task::spawn_blocking(move || {
        let drained = blocking.wait_drained(DRAIN_TIMEOUT);
        blocking.dispose().map(|()| drained)
    })
    .await
    .context("Snapshot task failed")??;

    if !drained {
        anyhow::bail!("Timed out printing the snapshot of {}", root.display());
    }
    Ok(())
}
