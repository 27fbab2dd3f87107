//! Relaywatch CLI - rw command

use anyhow::Result;
use clap::{Parser, Subcommand};
use relay_core::{NotifyFilters, WatcherKinds};
use std::path::PathBuf;

mod cmd;
mod config;
mod logging;
mod output;

/// Relaywatch - ordered file-system change stream for a directory
#[derive(Parser)]
#[command(name = "rw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ./relaywatch.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and print each change in order until Ctrl-C
    Watch {
        /// Directory to watch (default: path from the config file)
        path: Option<PathBuf>,

        #[command(flatten)]
        select: SelectArgs,

        /// Kinds to report, e.g. "created,deleted" or "all"
        #[arg(long)]
        kinds: Option<WatcherKinds>,

        /// Attributes whose change counts, e.g. "file_name,size"
        #[arg(long)]
        notify_filter: Option<NotifyFilters>,

        /// Report files already present before live changes
        #[arg(long)]
        existing: bool,
    },
    /// List the files a watcher would report as pre-existing
    Snapshot {
        /// Directory to list (default: path from the config file)
        path: Option<PathBuf>,

        #[command(flatten)]
        select: SelectArgs,
    },
    /// Show, check or generate configuration
    Config {
        /// Print an example config file
        #[arg(long, conflicts_with = "check")]
        example: bool,

        /// Validate a config file
        #[arg(long, value_name = "FILE")]
        check: Option<PathBuf>,
    },
}

/// Entry selection and output flags shared by watch and snapshot
#[derive(clap::Args, Debug, Default)]
pub struct SelectArgs {
    /// Only report names matching this glob (repeatable)
    #[arg(short, long = "filter", value_name = "GLOB")]
    pub filters: Vec<String>,

    /// Include subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Print records as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Watch {
            path,
            select,
            kinds,
            notify_filter,
            existing,
        } => {
            let overrides = cmd::watch::Overrides {
                path,
                select,
                kinds,
                notify_filter,
                existing,
            };
            cmd::watch::run(cli.config.as_deref(), overrides).await
        }
        Commands::Snapshot { path, select } => {
            cmd::snapshot::run(cli.config.as_deref(), path, select).await
        }
        Commands::Config { example, check } => {
            cmd::config::run(cli.config.as_deref(), example, check.as_deref())
        }
    }
}
