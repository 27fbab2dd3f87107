//! Configuration command
//!
//! Prints the effective configuration, an example file, or validates one.

use crate::config::{self, Config, DEFAULT_CONFIG_FILE, EXAMPLE};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(config_path: Option<&Path>, example: bool, check: Option<&Path>) -> Result<()> {
    if example {
        print!("{}", EXAMPLE);
        return Ok(());
    }

    if let Some(path) = check {
        return run_check(path);
    }

    let (config, source) = config::load(config_path)?;
    // No colors: the output is itself a valid config file
    match &source {
        Some(path) => println!("# Location: {}", path.display()),
        None => println!(
            "# No config file found ({} not present), showing defaults",
            DEFAULT_CONFIG_FILE
        ),
    }
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

/// Parse and validate a config file, summarizing what it watches
fn run_check(path: &Path) -> Result<()> {
    let config = Config::from_file(path)?;
    config
        .watch
        .validate()
        .with_context(|| format!("{} is not a usable configuration", path.display()))?;

    println!("{} {}", "✓".green(), path.display());
    let watch = &config.watch;
    match &watch.path {
        Some(root) => println!("  path:           {}", root.display()),
        None => println!("  path:           {}", "(none)".dimmed()),
    }
    println!("  kinds:          {}", watch.kinds);
    println!("  notify_filter:  {}", watch.notify_filter);
    if watch.filters.is_empty() {
        println!("  filters:        {}", "(everything)".dimmed());
    } else {
        println!("  filters:        {}", watch.filters.join(", "));
    }
    println!("  recursive:      {}", watch.include_subdirectories);
    Ok(())
}
