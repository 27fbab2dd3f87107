//! Watch a directory until Ctrl-C

use crate::config;
use crate::output::Printer;
use crate::SelectArgs;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use relay_core::{EventRecord, NotifyFilters, WatcherKinds};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use watcher::{FileWatcher, WatchError, WatchOptions};

/// Command-line values that take precedence over the config file
#[derive(Debug, Default)]
pub struct Overrides {
    pub path: Option<PathBuf>,
    pub select: SelectArgs,
    pub kinds: Option<WatcherKinds>,
    pub notify_filter: Option<NotifyFilters>,
    pub existing: bool,
}

impl Overrides {
    fn apply(self, options: &mut WatchOptions) {
        if let Some(path) = self.path {
            options.path = Some(path);
        }
        if !self.select.filters.is_empty() {
            options.filters = self.select.filters;
        }
        if self.select.recursive {
            options.include_subdirectories = true;
        }
        if let Some(kinds) = self.kinds {
            options.kinds = kinds;
        }
        if let Some(notify_filter) = self.notify_filter {
            options.notify_filter = notify_filter;
        }
        if self.existing {
            options.kinds |= WatcherKinds::EXISTED;
        }
    }
}

pub async fn run(config_path: Option<&Path>, overrides: Overrides) -> Result<()> {
    let (config, source) = config::load(config_path)?;
    if let Some(source) = &source {
        debug!("Loaded config from {}", source.display());
    }

    let printer = Printer::new(overrides.select.json || config.output.json, config.output.color);
    let mut options = config.watch;
    overrides.apply(&mut options);
    options.validate().context("Invalid watch configuration")?;

    let root = options
        .path
        .clone()
        .context("No directory to watch (pass PATH or set watch.path)")?;
    let kinds = options.kinds;

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
        .with_context(|| format!("Failed to start watching {}", root.display()))?;
    eprintln!(
        "{} {} ({}) - Ctrl-C to stop",
        "Watching".green().bold(),
        root.display(),
        kinds
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, shutting down");

    let disposing = Arc::clone(&watcher);
    tokio::task::spawn_blocking(move || disposing.dispose())
        .await
        .context("Dispose task failed")?
        .context("Failed to dispose watcher")?;

    let stats = watcher.stats();
    eprintln!(
        "{}",
        format!(
            "{} delivered, {} failed, {} drains",
            stats.delivered, stats.failed, stats.drains
        )
        .dimmed()
    );
    Ok(())
}
