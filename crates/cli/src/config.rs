//! Config file for the rw command
//!
//! ```toml
//! [watch]
//! path = "/srv/inbox"
//! kinds = ["existed", "created", "renamed"]
//!
//! [output]
//! json = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use watcher::WatchOptions;

/// File picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "relaywatch.toml";

/// Sample printed by `rw config --example`
pub const EXAMPLE: &str = r#"# relaywatch configuration

[watch]
# Directory to watch
path = "/srv/inbox"

# existed, created, deleted, changed, renamed (or "all")
kinds = ["existed", "created", "deleted", "changed", "renamed"]

# Glob patterns matched against file names; empty means everything
filters = ["*.csv", "*.json"]

# file_name, directory_name, attributes, size, last_write,
# last_access, creation_time, security
notify_filter = ["file_name", "directory_name", "last_write"]

include_subdirectories = false

[output]
# Print records as JSON lines
json = false

# Colorize plain output when writing to a terminal
color = true
"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchOptions,

    #[serde(default)]
    pub output: OutputConfig,
}

/// How records are printed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON lines instead of plain text (default: false)
    #[serde(default)]
    pub json: bool,

    /// Colorize plain output on a terminal (default: true)
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: false,
            color: default_color(),
        }
    }
}

fn default_color() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load the explicit config file, else `./relaywatch.toml` if present, else
/// defaults
pub fn load(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((Config::from_file(path)?, Some(path.to_path_buf())));
    }

    let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        let config = Config::from_file(&fallback)?;
        return Ok((config, Some(fallback)));
    }

    Ok((Config::default(), None))
}
