use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};

use crate::io::DEFAULT_LISTEN_PATH;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Config in {} is invalid: {error}", path.display())]
    Parse {
        path: PathBuf,
        error: ron::error::SpannedError,
    },
}

/// Settings for a recorder and the loop feeding it.
///
/// Every field has a default, a config file only needs to name what it
/// changes:
///
/// ```ron
/// (
///     recording_root: "/var/lib/ticks",
///     poll_interval_ms: 5,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory the tick files are written to
    pub recording_root: PathBuf,
    /// Unix socket path probes connect to
    pub listen: PathBuf,
    /// Pause between two passes over the clients
    pub poll_interval_ms: u64,
    /// Buffered bytes per client before they are written out
    pub flush_threshold: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            recording_root: PathBuf::from("."),
            listen: PathBuf::from(DEFAULT_LISTEN_PATH),
            poll_interval_ms: 1,
            flush_threshold: super::DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl RecorderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        ron::from_str(&text).map_err(|error| ConfigError::Parse {
            path: path.to_owned(),
            error,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
