//! History configuration via `history.toml`
//!
//! Every local history of a shard shares one `HistoryConfig`. A missing key
//! falls back to its default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::{StrataError, StrataResult};

/// Config file name conventionally placed next to the shard's data.
pub const CONFIG_FILE_NAME: &str = "history.toml";

/// Default number of responses retained per transaction for replay.
pub const DEFAULT_REPLAY_DEPTH: usize = 16;

fn default_replay_depth() -> usize {
    DEFAULT_REPLAY_DEPTH
}

/// Local history configuration loaded from `history.toml`.
///
/// # Example
///
/// ```toml
/// # Responses retained per transaction so retransmitted requests are
/// # answered identically instead of reprocessed. 0 disables replay.
/// replay_depth = 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Responses retained per transaction for retransmission replay.
    #[serde(default = "default_replay_depth")]
    pub replay_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            replay_depth: default_replay_depth(),
        }
    }
}

impl HistoryConfig {
    /// Same config with a different replay depth.
    pub fn with_replay_depth(mut self, replay_depth: usize) -> Self {
        self.replay_depth = replay_depth;
        self
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata local history configuration
#
# Responses retained per transaction (default: 16).
# A client that retransmits a request it already got an answer for
# receives the identical answer while it is still retained.
# 0 disables replay: retransmissions are then answered as out-of-order.
replay_depth = 16
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this config.
    pub fn from_toml_str(content: &str) -> StrataResult<Self> {
        toml::from_str(content)
            .map_err(|e| StrataError::config(format!("Failed to parse history config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize this config to TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> StrataResult<String> {
        toml::to_string(self)
            .map_err(|e| StrataError::config(format!("Failed to serialize history config: {}", e)))
    }
}
