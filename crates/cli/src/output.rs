//! Record printing

use owo_colors::OwoColorize;
use relay_core::{EventKind, EventRecord};
use std::io::IsTerminal;
use tracing::warn;
use watcher::WatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Plain { color: bool },
    Json,
}

/// Prints records to stdout and failures to stderr
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: Format,
}

impl Printer {
    /// Colors are only used when stdout is a terminal
    pub fn new(json: bool, color: bool) -> Self {
        let format = if json {
            Format::Json
        } else {
            Format::Plain {
                color: color && std::io::stdout().is_terminal(),
            }
        };
        Self { format }
    }

    pub fn record(&self, record: &EventRecord) {
        match self.format {
            Format::Json => match serde_json::to_string(record) {
                Ok(line) => println!("{}", line),
                Err(err) => warn!("Failed to serialize {}: {}", record, err),
            },
            Format::Plain { color } => println!("{}", plain_line(record, color)),
        }
    }

    pub fn error(&self, err: &WatchError) {
        match self.format {
            Format::Plain { color: true } => eprintln!("{} {}", "error:".red().bold(), err),
            _ => eprintln!("error: {}", err),
        }
    }
}

/// `created  notes/today.txt`, `renamed  a.txt -> b.txt`
fn plain_line(record: &EventRecord, color: bool) -> String {
    let label = format!("{:<8}", record.kind().as_str());
    let label = if color {
        match record.kind() {
            EventKind::Existed => label.dimmed().to_string(),
            EventKind::Created => label.green().to_string(),
            EventKind::Deleted => label.red().to_string(),
            EventKind::Changed => label.yellow().to_string(),
            EventKind::Renamed => label.cyan().to_string(),
        }
    } else {
        label
    };

    match record.old_name() {
        Some(old) => format!("{} {} -> {}", label, old, record.name()),
        None => format!("{} {}", label, record.name()),
    }
}
